// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::store::AppointmentStore;

/// Shared by every appointment handler. Services are built per request from these.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AppointmentStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn AppointmentStore>) -> Self {
        Self { config, store }
    }
}

pub fn appointment_routes(state: AppState) -> Router {
    // All scheduling operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))

        // Provider directory and availability
        .route("/providers", get(handlers::list_providers))
        .route("/providers/{provider_id}/slots/{date}", get(handlers::get_available_slots))
        .route(
            "/providers/{provider_id}/schedule",
            get(handlers::get_provider_schedule).put(handlers::update_provider_schedule),
        )

        // Admin only
        .route("/accounts/{user_id}", delete(handlers::remove_account))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
