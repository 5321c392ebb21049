// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use provider_cell::ProviderSchedule;
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, BookAppointmentRequest,
    StatusUpdateRequest,
};
use crate::services::conflict::ConflictChecker;
use crate::services::lifecycle::authorize_transition;
use crate::store::AppointmentStore;

pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    conflicts: ConflictChecker,
}

impl BookingService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            conflicts: ConflictChecker::new(Arc::clone(&store)),
            store,
        }
    }

    /// Books a slot for the calling patient. The new appointment starts `pending`.
    pub async fn book_appointment(
        &self,
        actor: &User,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.book_appointment_at(actor, request, Local::now().naive_local()).await
    }

    /// Same as [`Self::book_appointment`] with an explicit provider-local clock.
    pub async fn book_appointment_at(
        &self,
        actor: &User,
        request: BookAppointmentRequest,
        now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        if actor.role != Role::Patient {
            return Err(AppointmentError::Forbidden(
                "Only patients can book appointments".to_string(),
            ));
        }

        let booking = request.validate(now)?;
        debug!(
            "Booking request from patient {} for provider {} at {} {}",
            actor.id, booking.provider_id, booking.date, booking.time
        );

        let provider = self
            .store
            .get_account(booking.provider_id)
            .await?
            .filter(|account| account.role == Role::Provider)
            .ok_or_else(|| AppointmentError::NotFound("Provider not found".to_string()))?;

        let schedule = self
            .store
            .get_schedule(provider.id)
            .await?
            .unwrap_or_else(|| ProviderSchedule::default_for(provider.id));

        if !schedule.offers_slot(booking.time)? {
            return Err(AppointmentError::Validation(format!(
                "{} is not an available slot for this provider",
                provider_cell::models::time_format::format_time(&booking.time)
            )));
        }

        self.conflicts
            .ensure_slot_free(provider.id, actor.id, booking.date, booking.time)
            .await?;

        let now_utc = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: actor.id,
            provider_id: provider.id,
            date: booking.date,
            time: booking.time,
            reason: booking.reason,
            notes: booking.notes,
            status: AppointmentStatus::Pending,
            created_at: now_utc,
            updated_at: now_utc,
        };

        // The unique indexes catch a concurrent booking that passed the check above.
        let created = self.store.insert_appointment(&appointment).await.map_err(|e| {
            if e.is_conflict() {
                warn!("Lost booking race for provider {} at {} {}", provider.id, appointment.date, appointment.time);
            }
            AppointmentError::from(e)
        })?;

        info!("Appointment {} booked for patient {} with provider {}", created.id, actor.id, provider.id);
        Ok(created)
    }

    /// Visible to its patient, its provider and administrators.
    pub async fn get_appointment(
        &self,
        actor: &User,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment not found".to_string()))?;

        if !actor.is_admin() && !appointment.involves(actor.id) {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view this appointment".to_string(),
            ));
        }

        Ok(appointment)
    }

    /// Patients see their bookings, providers their calendar, administrators everything.
    pub async fn list_appointments(&self, actor: &User) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = match actor.role {
            Role::Patient => AppointmentFilter::for_patient(actor.id),
            Role::Provider => AppointmentFilter::for_provider(actor.id),
            Role::Admin => AppointmentFilter::default(),
        };

        Ok(self.store.list_appointments(&filter).await?)
    }

    pub async fn update_status(
        &self,
        actor: &User,
        appointment_id: Uuid,
        request: StatusUpdateRequest,
    ) -> Result<Appointment, AppointmentError> {
        let target = request.target_status()?;
        self.transition(actor, appointment_id, target).await
    }

    pub async fn cancel_appointment(
        &self,
        actor: &User,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(actor, appointment_id, AppointmentStatus::Cancelled).await
    }

    /// Applies one state-machine step as a single guarded update.
    pub async fn transition(
        &self,
        actor: &User,
        appointment_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let guard = authorize_transition(actor, target)?;

        let updated = self
            .store
            .transition_status(appointment_id, &guard, target)
            .await?
            .ok_or_else(|| {
                AppointmentError::NotFound(
                    "No eligible appointment found for this status change".to_string(),
                )
            })?;

        info!("Appointment {} moved to {} by {} {}", appointment_id, target, actor.role, actor.id);
        Ok(updated)
    }
}
