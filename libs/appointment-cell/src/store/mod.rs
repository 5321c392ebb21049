// libs/appointment-cell/src/store/mod.rs
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use provider_cell::ProviderSchedule;
use shared_database::DatabaseError;

use crate::models::{Account, Appointment, AppointmentFilter, AppointmentStatus, ProviderListing};

pub mod sqlite;
pub mod supabase;

pub use sqlite::SqliteAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// Which side of an appointment an actor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Patient,
    Provider,
}

impl Participant {
    pub fn column(&self) -> &'static str {
        match self {
            Participant::Patient => "patient_id",
            Participant::Provider => "provider_id",
        }
    }
}

/// Conditions a status update must meet to touch the row.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionGuard {
    pub allowed_from: Vec<AppointmentStatus>,
    pub owner: Option<(Participant, Uuid)>,
}

/// Storage collaborator for the scheduling core.
///
/// Implementations must back `insert_appointment` with unique constraints on
/// (provider, date, time) and (patient, date, time) for rows that still hold
/// their slot, reporting a violation as [`DatabaseError::Conflict`].
/// `transition_status` is a single conditional update and `delete_account`
/// is all-or-nothing.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, DatabaseError>;

    /// Every account with role `provider`, ordered by name.
    async fn list_providers(&self) -> Result<Vec<ProviderListing>, DatabaseError>;

    async fn get_schedule(&self, provider_id: Uuid) -> Result<Option<ProviderSchedule>, DatabaseError>;

    async fn upsert_schedule(&self, schedule: &ProviderSchedule) -> Result<ProviderSchedule, DatabaseError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError>;

    /// True when `participant_id` already holds a non-cancelled appointment at `date` `time`.
    async fn slot_taken(
        &self,
        participant: Participant,
        participant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, DatabaseError>;

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;

    /// `None` when no row matched the id, source states and owner.
    async fn transition_status(
        &self,
        appointment_id: Uuid,
        guard: &TransitionGuard,
        new_status: AppointmentStatus,
    ) -> Result<Option<Appointment>, DatabaseError>;

    /// Removes the account with its appointments and schedule. `None` when the
    /// account does not exist, otherwise the number of appointments removed.
    async fn delete_account(&self, account_id: Uuid) -> Result<Option<usize>, DatabaseError>;
}
