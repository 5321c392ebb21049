// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use provider_cell::models::time_format;
use provider_cell::{ProviderSchedule, ScheduleError};
use shared_database::DatabaseError;
use shared_models::auth::Role;

pub const MIN_REASON_LENGTH: usize = 5;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "time_format")]
    pub time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.provider_id == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled appointments release their slot; every other status holds it.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// Statuses that keep a slot booked, in declaration order.
    pub fn slot_holding() -> Vec<AppointmentStatus> {
        Self::ALL.into_iter().filter(|status| status.holds_slot()).collect()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::Validation(format!(
                "Invalid status '{}'. Expected one of: pending, confirmed, completed, cancelled",
                other
            ))),
        }
    }
}

/// Account row as seen by the scheduling core. Owned by the identity layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub email: String,
}

/// Provider directory entry with the window and slot length patients will be offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderListing {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(with = "time_format")]
    pub window_start: NaiveTime,
    #[serde(with = "time_format")]
    pub window_end: NaiveTime,
    pub slot_minutes: u32,
}

impl ProviderListing {
    /// Providers without a stored schedule are listed with the defaults.
    pub fn new(account: Account, schedule: Option<ProviderSchedule>) -> Self {
        let schedule = schedule.unwrap_or_else(|| ProviderSchedule::default_for(account.id));
        let (window_start, window_end) = schedule.effective_window();
        Self {
            id: account.id,
            full_name: account.full_name,
            email: account.email,
            window_start,
            window_end,
            slot_minutes: schedule.slot_minutes,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Raw booking payload. Every field is optional so that a missing value is
/// reported as a validation failure instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(alias = "providerId")]
    pub provider_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// A booking payload that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBooking {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
}

impl BookAppointmentRequest {
    /// Checks required fields, formats and that the slot lies after `now`
    /// (provider-local wall clock).
    pub fn validate(&self, now: NaiveDateTime) -> Result<ValidatedBooking, AppointmentError> {
        let provider_id = required(&self.provider_id, "provider_id")?;
        let provider_id = Uuid::parse_str(provider_id)
            .map_err(|_| AppointmentError::Validation("provider_id must be a valid UUID".to_string()))?;

        let date = parse_date(required(&self.date, "date")?)?;

        let raw_time = required(&self.time, "time")?;
        let time = time_format::parse_time(raw_time).ok_or_else(|| {
            AppointmentError::Validation(format!("Invalid time '{}', expected HH:MM", raw_time))
        })?;

        let reason = required(&self.reason, "reason")?.trim().to_string();
        if reason.chars().count() < MIN_REASON_LENGTH {
            return Err(AppointmentError::Validation(format!(
                "reason must be at least {} characters",
                MIN_REASON_LENGTH
            )));
        }

        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);

        ensure_future(date, time, now)?;

        Ok(ValidatedBooking {
            provider_id,
            date,
            time,
            reason,
            notes,
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppointmentError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppointmentError::Validation(format!("{} is required", field)))
}

pub fn parse_id(raw: &str, field: &str) -> Result<Uuid, AppointmentError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppointmentError::Validation(format!("{} must be a valid UUID", field)))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppointmentError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

/// Bookings must start strictly after `now`.
pub fn ensure_future(
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
) -> Result<(), AppointmentError> {
    if date.and_time(time) <= now {
        return Err(AppointmentError::Validation(
            "Appointment must be scheduled in the future".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
}

impl StatusUpdateRequest {
    pub fn target_status(&self) -> Result<AppointmentStatus, AppointmentError> {
        self.status
            .as_deref()
            .ok_or_else(|| AppointmentError::Validation("status is required".to_string()))?
            .parse()
    }
}

/// Row filter for appointment listings. Results are ordered by date, then time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub slot_holding_only: bool,
}

impl AppointmentFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    pub fn for_provider(provider_id: Uuid) -> Self {
        Self {
            provider_id: Some(provider_id),
            ..Default::default()
        }
    }

    /// Appointments currently holding a provider's slots on `date`.
    pub fn booked_slots(provider_id: Uuid, date: NaiveDate) -> Self {
        Self {
            provider_id: Some(provider_id),
            date: Some(date),
            slot_holding_only: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "time_format")]
    pub window_start: NaiveTime,
    #[serde(with = "time_format")]
    pub window_end: NaiveTime,
    pub slot_minutes: u32,
    pub available_slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRemoval {
    pub account_id: Uuid,
    pub removed_appointments: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppointmentError {
    /// Only storage failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppointmentError::Storage(_))
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Conflict(_) => {
                AppointmentError::Conflict("This time slot is no longer available".to_string())
            }
            DatabaseError::NotFound(msg) => AppointmentError::NotFound(msg),
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(error: ScheduleError) -> Self {
        AppointmentError::Validation(error.to_string())
    }
}
