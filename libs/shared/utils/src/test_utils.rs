use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, DatabaseBackend};
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing the Supabase client at a mock server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            database_backend: DatabaseBackend::Sqlite,
            sqlite_path: ":memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            cors_allowed_origins: vec![],
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn provider(email: &str) -> Self {
        Self::new(email, Role::Provider)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            role: self.role,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        Self::sign(
            json!({
                "sub": user.id.to_string(),
                "email": user.email,
                "role": user.role.as_str(),
                "iat": Utc::now().timestamp(),
                "exp": (Utc::now() + Duration::hours(exp_hours.unwrap_or(24))).timestamp()
            }),
            secret,
        )
    }

    pub fn create_token_with_role(user_id: Uuid, role: &str, secret: &str) -> String {
        Self::sign(
            json!({
                "sub": user_id.to_string(),
                "role": role,
                "exp": (Utc::now() + Duration::hours(1)).timestamp()
            }),
            secret,
        )
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("HS256 encoding of JSON claims cannot fail")
    }
}

/// PostgREST row shapes returned by the mocked Supabase backend.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn account_row(user_id: Uuid, role: Role) -> serde_json::Value {
        json!({
            "id": user_id,
            "role": role.as_str(),
            "full_name": "Test User",
            "email": format!("{}@example.com", role.as_str())
        })
    }

    pub fn schedule_row(provider_id: Uuid, start: &str, end: &str, slot_minutes: u32) -> serde_json::Value {
        json!({
            "provider_id": provider_id,
            "window_start": start,
            "window_end": end,
            "slot_minutes": slot_minutes
        })
    }

    pub fn appointment_row(
        id: Uuid,
        patient_id: Uuid,
        provider_id: Uuid,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "provider_id": provider_id,
            "date": date,
            "time": time,
            "reason": "Annual check-up",
            "notes": null,
            "status": status,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
