pub mod models;
pub mod services;

pub use models::{ProviderSchedule, ScheduleError, UpdateScheduleRequest};
pub use services::slots::generate_slots;
