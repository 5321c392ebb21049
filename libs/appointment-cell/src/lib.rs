pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use models::*;
pub use router::{appointment_routes, AppState};
pub use store::{AppointmentStore, SqliteAppointmentStore, SupabaseAppointmentStore};
