// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use provider_cell::UpdateScheduleRequest;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    parse_date, parse_id, AppointmentError, BookAppointmentRequest, StatusUpdateRequest,
};
use crate::router::AppState;
use crate::services::{AccountRemovalService, AvailabilityService, BookingService};

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::Storage(msg) => AppError::Database(msg),
        }
    }
}

/// Malformed or missing JSON bodies get the same envelope as every other validation error.
fn read_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::ValidationError(rejection.body_text()))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = read_body(payload)?;
    let booking_service = BookingService::new(state.store.clone());
    let appointment = booking_service.book_appointment(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

pub async fn list_my_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(state.store.clone());
    let appointments = booking_service.list_appointments(&user).await?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_id(&appointment_id, "appointment_id")?;
    let booking_service = BookingService::new(state.store.clone());
    let appointment = booking_service.get_appointment(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_id(&appointment_id, "appointment_id")?;
    let request = read_body(payload)?;
    let booking_service = BookingService::new(state.store.clone());
    let appointment = booking_service
        .update_status(&user, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Appointment {}", appointment.status),
        "appointment": appointment
    })))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_id(&appointment_id, "appointment_id")?;
    let booking_service = BookingService::new(state.store.clone());
    let appointment = booking_service
        .cancel_appointment(&user, appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled successfully",
        "appointment": appointment
    })))
}

// ==============================================================================
// PROVIDER AVAILABILITY HANDLERS
// ==============================================================================

pub async fn list_providers(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(state.store.clone());
    let providers = availability_service.list_providers().await?;

    Ok(Json(json!({
        "success": true,
        "count": providers.len(),
        "providers": providers
    })))
}

pub async fn get_available_slots(
    State(state): State<AppState>,
    Path((provider_id, date)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let provider_id = parse_id(&provider_id, "provider_id")?;
    let date = parse_date(&date)?;
    let availability_service = AvailabilityService::new(state.store.clone());
    let availability = availability_service.available_slots(provider_id, date).await?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

pub async fn get_provider_schedule(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let provider_id = parse_id(&provider_id, "provider_id")?;
    let availability_service = AvailabilityService::new(state.store.clone());
    let schedule = availability_service.get_schedule(provider_id).await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn update_provider_schedule(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Extension(user): Extension<User>,
    payload: Result<Json<UpdateScheduleRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let provider_id = parse_id(&provider_id, "provider_id")?;
    let request = read_body(payload)?;
    let availability_service = AvailabilityService::new(state.store.clone());
    let schedule = availability_service
        .update_schedule(&user, provider_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Schedule updated successfully"
    })))
}

// ==============================================================================
// ACCOUNT HANDLERS
// ==============================================================================

pub async fn remove_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = parse_id(&user_id, "user_id")?;
    let removal_service = AccountRemovalService::new(state.store.clone());
    let removal = removal_service.remove_account(&user, user_id).await?;

    Ok(Json(json!({
        "success": true,
        "removal": removal,
        "message": "Account and related records removed"
    })))
}
