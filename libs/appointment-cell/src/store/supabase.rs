// libs/appointment-cell/src/store/supabase.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use provider_cell::models::time_format;
use provider_cell::ProviderSchedule;
use shared_config::AppConfig;
use shared_database::supabase::{representation_headers, upsert_headers, SupabaseClient};
use shared_database::DatabaseError;

use super::{AppointmentStore, Participant, TransitionGuard};
use crate::models::{Account, Appointment, AppointmentFilter, AppointmentStatus, ProviderListing};

/// PostgREST backend. Uniqueness and the account cascade live in the
/// Postgres schema (`idx_appointments_*_slot`, `delete_account`).
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn token(&self) -> Option<&str> {
        Some(self.service_key.as_str())
    }

    async fn select<T>(&self, path: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.supabase.request(Method::GET, path, self.token(), None).await
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, DatabaseError> {
        let path = format!(
            "/rest/v1/accounts?id=eq.{}&select=id,role,full_name,email",
            account_id
        );
        let rows: Vec<Account> = self.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_providers(&self) -> Result<Vec<ProviderListing>, DatabaseError> {
        let providers: Vec<Account> = self
            .select("/rest/v1/accounts?role=eq.provider&select=id,role,full_name,email&order=full_name.asc,id.asc")
            .await?;
        if providers.is_empty() {
            return Ok(Vec::new());
        }

        let ids = providers
            .iter()
            .map(|provider| provider.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/provider_schedules?provider_id=in.({})&select=provider_id,window_start,window_end,slot_minutes",
            ids
        );
        let schedules: Vec<ProviderSchedule> = self.select(&path).await?;
        let mut schedules: HashMap<Uuid, ProviderSchedule> = schedules
            .into_iter()
            .map(|schedule| (schedule.provider_id, schedule))
            .collect();

        Ok(providers
            .into_iter()
            .map(|provider| {
                let schedule = schedules.remove(&provider.id);
                ProviderListing::new(provider, schedule)
            })
            .collect())
    }

    async fn get_schedule(&self, provider_id: Uuid) -> Result<Option<ProviderSchedule>, DatabaseError> {
        let path = format!(
            "/rest/v1/provider_schedules?provider_id=eq.{}&select=provider_id,window_start,window_end,slot_minutes",
            provider_id
        );
        let rows: Vec<ProviderSchedule> = self.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_schedule(&self, schedule: &ProviderSchedule) -> Result<ProviderSchedule, DatabaseError> {
        let mut body = serde_json::to_value(schedule)?;
        body["updated_at"] = json!(Utc::now().to_rfc3339());

        let rows: Vec<ProviderSchedule> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/provider_schedules?on_conflict=provider_id",
                self.token(),
                Some(body),
                Some(upsert_headers()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Decode("Schedule upsert returned no row".to_string()))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError> {
        let mut query_parts = vec!["select=*".to_string()];

        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(provider_id) = filter.provider_id {
            query_parts.push(format!("provider_id=eq.{}", provider_id));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("date=eq.{}", date.format("%Y-%m-%d")));
        }
        if filter.slot_holding_only {
            query_parts.push(format!(
                "status=in.({})",
                status_list(&AppointmentStatus::slot_holding())
            ));
        }
        query_parts.push("order=date.asc,time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.select(&path).await
    }

    async fn slot_taken(
        &self,
        participant: Participant,
        participant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&date=eq.{}&time=eq.{}&status=in.({})&select=id&limit=1",
            participant.column(),
            participant_id,
            date.format("%Y-%m-%d"),
            time_format::format_time(&time),
            status_list(&AppointmentStatus::slot_holding())
        );
        let rows: Vec<Value> = self.select(&path).await?;
        Ok(!rows.is_empty())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let body = serde_json::to_value(appointment)?;

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Decode("Insert returned no row".to_string()))
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        guard: &TransitionGuard,
        new_status: AppointmentStatus,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.({})",
            appointment_id,
            status_list(&guard.allowed_from)
        );
        if let Some((participant, owner_id)) = guard.owner {
            path.push_str(&format!("&{}=eq.{}", participant.column(), owner_id));
        }

        let body = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await?;

        if rows.is_empty() {
            debug!("No eligible row for transition of appointment {}", appointment_id);
        }
        Ok(rows.into_iter().next())
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<Option<usize>, DatabaseError> {
        let removed: i64 = self
            .supabase
            .rpc("delete_account", self.token(), json!({ "target_id": account_id }))
            .await?;

        if removed < 0 {
            warn!("delete_account found no account {}", account_id);
            return Ok(None);
        }

        usize::try_from(removed)
            .map(Some)
            .map_err(|e| DatabaseError::Decode(e.to_string()))
    }
}

/// PostgREST `in.(...)` operand.
fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses
        .iter()
        .map(AppointmentStatus::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
