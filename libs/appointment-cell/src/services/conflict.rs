// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::AppointmentError;
use crate::store::{AppointmentStore, Participant};

/// Detects double bookings. Only cancelled appointments free a slot.
pub struct ConflictChecker {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictChecker {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn has_provider_conflict(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, AppointmentError> {
        Ok(self
            .store
            .slot_taken(Participant::Provider, provider_id, date, time)
            .await?)
    }

    pub async fn has_patient_conflict(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, AppointmentError> {
        Ok(self
            .store
            .slot_taken(Participant::Patient, patient_id, date, time)
            .await?)
    }

    /// Fails with `Conflict` when either side is already booked at `date` `time`.
    pub async fn ensure_slot_free(
        &self,
        provider_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), AppointmentError> {
        debug!("Checking conflicts for provider {} / patient {} at {} {}", provider_id, patient_id, date, time);

        if self.has_provider_conflict(provider_id, date, time).await? {
            warn!("Provider {} already booked at {} {}", provider_id, date, time);
            return Err(AppointmentError::Conflict(
                "Provider already has an appointment at this time".to_string(),
            ));
        }

        if self.has_patient_conflict(patient_id, date, time).await? {
            warn!("Patient {} already booked at {} {}", patient_id, date, time);
            return Err(AppointmentError::Conflict(
                "You already have an appointment at this time".to_string(),
            ));
        }

        Ok(())
    }
}
