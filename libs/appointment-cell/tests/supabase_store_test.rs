use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, AppointmentFilter, AppointmentStatus};
use appointment_cell::services::BookingService;
use appointment_cell::store::{AppointmentStore, Participant, SupabaseAppointmentStore, TransitionGuard};
use shared_database::DatabaseError;
use shared_models::auth::Role;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    SupabaseAppointmentStore::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config())
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 3, 1).unwrap()
}

#[tokio::test]
async fn reads_account_and_schedule_rows() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/accounts"))
        .and(query_param("id", format!("eq.{}", provider_id)))
        .and(header("apikey", "test-anon-key"))
        .and(header("Authorization", "Bearer test-service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::account_row(provider_id, Role::Provider)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/provider_schedules"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_row(provider_id, "09:00:00", "12:00:00", 60)
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server);

    let account = store.get_account(provider_id).await.unwrap().unwrap();
    assert_eq!(account.role, Role::Provider);

    let schedule = store.get_schedule(provider_id).await.unwrap().unwrap();
    assert_eq!(schedule.slots().unwrap().len(), 3);
}

#[tokio::test]
async fn provider_directory_merges_schedules_in_name_order() {
    let server = MockServer::start().await;
    let configured = Uuid::new_v4();
    let unconfigured = Uuid::new_v4();

    let mut first = MockSupabaseResponses::account_row(configured, Role::Provider);
    first["full_name"] = json!("Dr. Alvarez");
    let mut second = MockSupabaseResponses::account_row(unconfigured, Role::Provider);
    second["full_name"] = json!("Dr. Zamora");
    second["email"] = json!("zamora@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/accounts"))
        .and(query_param("role", "eq.provider"))
        .and(query_param("order", "full_name.asc,id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([first, second])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/provider_schedules"))
        .and(query_param("provider_id", format!("in.({},{})", configured, unconfigured)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_row(configured, "09:00:00", "12:00:00", 60)
        ])))
        .mount(&server)
        .await;

    let providers = store_for(&server).list_providers().await.unwrap();
    assert_eq!(providers.len(), 2);

    assert_eq!(providers[0].id, configured);
    assert_eq!(providers[0].window_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(providers[0].slot_minutes, 60);

    assert_eq!(providers[1].full_name, "Dr. Zamora");
    assert_eq!(providers[1].window_start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(providers[1].window_end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    assert_eq!(providers[1].slot_minutes, 30);
}

#[tokio::test]
async fn slot_check_filters_out_cancelled_rows() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("date", "eq.2099-03-01"))
        .and(query_param("time", "eq.10:00"))
        .and(query_param("status", "in.(pending,confirmed,completed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let taken = store
        .slot_taken(
            Participant::Provider,
            provider_id,
            day(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert!(taken);
}

#[tokio::test]
async fn guarded_patch_carries_source_states_and_owner() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "in.(pending,confirmed)"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                appointment_id, patient_id, provider_id, "2099-03-01", "10:00:00", "cancelled"
            )
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let guard = TransitionGuard {
        allowed_from: vec![AppointmentStatus::Pending, AppointmentStatus::Confirmed],
        owner: Some((Participant::Patient, patient_id)),
    };

    let updated = store
        .transition_status(appointment_id, &guard, AppointmentStatus::Cancelled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Cancelled);
    assert_eq!(updated.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
}

#[tokio::test]
async fn empty_patch_result_means_no_eligible_row() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let guard = TransitionGuard {
        allowed_from: vec![AppointmentStatus::Pending],
        owner: None,
    };
    let result = store
        .transition_status(Uuid::new_v4(), &guard, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn unique_violation_on_insert_is_a_conflict() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("pat@example.com");
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::account_row(provider_id, Role::Provider)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/provider_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Both pre-checks pass; the race is lost at insert time.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "duplicate key value violates unique constraint \"idx_appointments_provider_slot\"",
            "23505",
        )))
        .mount(&server)
        .await;

    let service = BookingService::new(std::sync::Arc::new(store_for(&server)));
    let request = appointment_cell::models::BookAppointmentRequest {
        provider_id: Some(provider_id.to_string()),
        date: Some("2099-03-01".to_string()),
        time: Some("10:00".to_string()),
        reason: Some("Annual check-up".to_string()),
        notes: None,
    };

    let result = service.book_appointment(&patient.to_user(), request).await;
    assert_matches!(result, Err(AppointmentError::Conflict(_)));
}

#[tokio::test]
async fn listing_builds_filters_and_order() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("date", "eq.2099-03-01"))
        .and(query_param("status", "in.(pending,confirmed,completed)"))
        .and(query_param("order", "date.asc,time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                Uuid::new_v4(), Uuid::new_v4(), provider_id, "2099-03-01", "09:00:00", "confirmed"
            ),
            MockSupabaseResponses::appointment_row(
                Uuid::new_v4(), Uuid::new_v4(), provider_id, "2099-03-01", "11:30:00", "pending"
            )
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let rows = store
        .list_appointments(&AppointmentFilter::booked_slots(provider_id, day()))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].time, NaiveTime::from_hms_opt(11, 30, 0).unwrap());
}

#[tokio::test]
async fn account_cascade_goes_through_rpc() {
    let server = MockServer::start().await;
    let account_id = Uuid::new_v4();
    let missing_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/delete_account"))
        .and(body_partial_json(json!({ "target_id": account_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(3)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/delete_account"))
        .and(body_partial_json(json!({ "target_id": missing_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(-1)))
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert_eq!(store.delete_account(account_id).await.unwrap(), Some(3));
    assert_eq!(store.delete_account(missing_id).await.unwrap(), None);
}

#[tokio::test]
async fn server_errors_surface_as_storage_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.get_appointment(Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, DatabaseError::Api { status: 500, .. });

    let err: AppointmentError = err.into();
    assert!(err.is_retryable());
}
