#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use appointment_cell::models::{Account, BookAppointmentRequest};
use appointment_cell::store::{AppointmentStore, SqliteAppointmentStore};
use shared_models::auth::{Role, User};
use shared_utils::test_utils::TestUser;

pub const FUTURE_DATE: &str = "2099-03-01";

pub struct Clinic {
    pub store: SqliteAppointmentStore,
    pub patient: TestUser,
    pub other_patient: TestUser,
    pub provider: TestUser,
    pub other_provider: TestUser,
    pub admin: TestUser,
}

impl Clinic {
    /// Fresh in-memory database seeded with two patients, two providers and an admin.
    pub async fn seeded() -> Self {
        let store = SqliteAppointmentStore::in_memory().unwrap();
        let clinic = Self {
            store,
            patient: TestUser::patient("pat@example.com"),
            other_patient: TestUser::patient("quinn@example.com"),
            provider: TestUser::provider("dr.d@example.com"),
            other_provider: TestUser::provider("dr.e@example.com"),
            admin: TestUser::admin("admin@example.com"),
        };

        for user in [
            &clinic.patient,
            &clinic.other_patient,
            &clinic.provider,
            &clinic.other_provider,
            &clinic.admin,
        ] {
            clinic.store.register_account(&account_for(user)).await.unwrap();
        }

        clinic
    }

    pub fn shared_store(&self) -> Arc<dyn AppointmentStore> {
        Arc::new(self.store.clone())
    }
}

pub fn account_for(user: &TestUser) -> Account {
    Account {
        id: user.id,
        role: user.role,
        full_name: format!("Test {}", user.role),
        email: user.email.clone(),
    }
}

pub fn actor(user: &TestUser) -> User {
    user.to_user()
}

pub fn actor_with_role(role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: None,
        role,
        created_at: None,
    }
}

pub fn booking(provider_id: Uuid, date: &str, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        provider_id: Some(provider_id.to_string()),
        date: Some(date.to_string()),
        time: Some(time.to_string()),
        reason: Some("Persistent cough".to_string()),
        notes: None,
    }
}

pub fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}
