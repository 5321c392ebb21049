// libs/appointment-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use provider_cell::models::time_format;
use provider_cell::{ProviderSchedule, UpdateScheduleRequest};
use shared_models::auth::{Role, User};

use crate::models::{
    ensure_future, Account, AppointmentError, AppointmentFilter, AvailabilityResponse, ProviderListing,
};
use crate::store::AppointmentStore;

pub struct AvailabilityService {
    store: Arc<dyn AppointmentStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderListing>, AppointmentError> {
        let providers = self.store.list_providers().await?;
        debug!("Listing {} providers", providers.len());
        Ok(providers)
    }

    pub async fn available_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        self.available_slots_at(provider_id, date, Local::now().naive_local()).await
    }

    /// Free slots for a provider on `date`: the generated slot list minus
    /// every slot held by a non-cancelled appointment and every slot not after `now`.
    pub async fn available_slots_at(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        let provider = self.require_provider(provider_id).await?;
        let schedule = self.schedule_for(provider.id).await?;

        let booked = self
            .store
            .list_appointments(&AppointmentFilter::booked_slots(provider.id, date))
            .await?;
        let taken: HashSet<_> = booked.iter().map(|appointment| appointment.time).collect();

        let available: Vec<String> = schedule
            .slots()?
            .into_iter()
            .filter(|slot| !taken.contains(slot) && ensure_future(date, *slot, now).is_ok())
            .map(|slot| time_format::format_time(&slot))
            .collect();

        debug!(
            "Provider {} on {}: {} free, {} taken",
            provider.id,
            date,
            available.len(),
            taken.len()
        );

        let (window_start, window_end) = schedule.effective_window();
        Ok(AvailabilityResponse {
            provider_id: provider.id,
            date,
            window_start,
            window_end,
            slot_minutes: schedule.slot_minutes,
            available_slots: available,
        })
    }

    pub async fn get_schedule(&self, provider_id: Uuid) -> Result<ProviderSchedule, AppointmentError> {
        let provider = self.require_provider(provider_id).await?;
        self.schedule_for(provider.id).await
    }

    /// Providers edit their own working window; administrators may edit any.
    pub async fn update_schedule(
        &self,
        actor: &User,
        provider_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<ProviderSchedule, AppointmentError> {
        if !actor.is_admin() && actor.id != provider_id {
            return Err(AppointmentError::Forbidden(
                "Providers can only change their own schedule".to_string(),
            ));
        }

        let provider = self.require_provider(provider_id).await?;
        let updated = self.schedule_for(provider.id).await?.apply(&request)?;
        let stored = self.store.upsert_schedule(&updated).await?;

        info!(
            "Schedule for provider {} set to {:?}-{:?} every {} minutes",
            provider.id, stored.window_start, stored.window_end, stored.slot_minutes
        );
        Ok(stored)
    }

    async fn require_provider(&self, provider_id: Uuid) -> Result<Account, AppointmentError> {
        self.store
            .get_account(provider_id)
            .await?
            .filter(|account| account.role == Role::Provider)
            .ok_or_else(|| AppointmentError::NotFound("Provider not found".to_string()))
    }

    async fn schedule_for(&self, provider_id: Uuid) -> Result<ProviderSchedule, AppointmentError> {
        Ok(self
            .store
            .get_schedule(provider_id)
            .await?
            .unwrap_or_else(|| ProviderSchedule::default_for(provider_id)))
    }
}
