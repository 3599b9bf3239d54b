use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{BookingStore, StoreError, SupabaseStore};
use shared_models::{Appointment, AppointmentStatus};

fn test_config(url: &str) -> AppConfig {
    AppConfig {
        supabase_url: url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_service_role_key: "test-service-key".to_string(),
        supabase_jwt_secret: "test-secret".to_string(),
        mercadopago_api_url: "http://localhost:1".to_string(),
        payment_notification_url: None,
        push_function_path: "/functions/v1/send-push".to_string(),
        http_timeout_secs: 5,
        business_utc_offset_minutes: -180,
    }
}

fn appointment_json(id: Uuid, professional_id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "professional_id": professional_id,
        "client_name": "Maria Souza",
        "client_phone": "11987654321",
        "client_email": null,
        "date": "2026-10-19",
        "time": "10:00:00",
        "status": status,
        "link_id": null,
        "created_at": "2026-10-18T12:00:00+00:00",
        "updated_at": "2026-10-18T12:00:00+00:00"
    })
}

fn sample_appointment(professional_id: Uuid) -> Appointment {
    let now = chrono::Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        professional_id,
        client_name: "Maria Souza".to_string(),
        client_phone: "11987654321".to_string(),
        client_email: None,
        date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        status: AppointmentStatus::Confirmado,
        link_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_consume_link_is_conditional_on_unused() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));
    let token = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/one_time_links"))
        .and(query_param("id", format!("eq.{}", token)))
        .and(query_param("is_used", "eq.false"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "is_used": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let consumed = store.consume_link(token, appointment_id).await.unwrap();
    assert!(!consumed, "an empty representation means the link was already used");
}

#[tokio::test]
async fn test_consume_link_success() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));
    let token = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/one_time_links"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": token,
            "professional_id": Uuid::new_v4(),
            "is_used": true,
            "appointment_id": appointment_id,
            "created_at": "2026-10-18T12:00:00+00:00"
        }])))
        .mount(&mock_server)
        .await;

    assert!(store.consume_link(token, appointment_id).await.unwrap());
}

#[tokio::test]
async fn test_insert_appointment_maps_unique_violation() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("apikey", "test-service-key"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_active_slot_key\""
        })))
        .mount(&mock_server)
        .await;

    let result = store.insert_appointment(&sample_appointment(Uuid::new_v4())).await;
    assert_matches!(result, Err(StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn test_transition_appointment_filters_on_current_status() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));
    let appointment_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "in.(Pendente,AguardandoPagamento)"))
        .and(body_partial_json(json!({ "status": "Confirmado" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(appointment_id, professional_id, "Confirmado")
        ])))
        .mount(&mock_server)
        .await;

    let updated = store
        .transition_appointment(
            appointment_id,
            AppointmentStatus::Confirmado,
            &[AppointmentStatus::Pendente, AppointmentStatus::AguardandoPagamento],
        )
        .await
        .unwrap()
        .expect("row should match");

    assert_eq!(updated.status, AppointmentStatus::Confirmado);
    assert_eq!(updated.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
}

#[tokio::test]
async fn test_booked_times_excludes_cancelled() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("date", "eq.2026-10-19"))
        .and(query_param("status", "neq.Cancelado"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_json(Uuid::new_v4(), professional_id, "Confirmado")
        ])))
        .mount(&mock_server)
        .await;

    let times = store
        .booked_times(professional_id, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
        .await
        .unwrap();

    assert_eq!(times, vec![NaiveTime::from_hms_opt(10, 0, 0).unwrap()]);
}

#[tokio::test]
async fn test_reserve_usage_calls_rpc_with_ceiling() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));
    let professional_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/reserve_daily_usage"))
        .and(body_partial_json(json!({ "p_today": "2026-10-19", "p_trial_limit": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "professional_id": professional_id,
            "plan": "trial",
            "daily_usage": 1,
            "last_usage_date": "2026-10-19",
            "premium_expires_at": null
        }])))
        .mount(&mock_server)
        .await;

    let usage = store
        .reserve_usage(professional_id, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 5)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(usage.daily_usage, 1);
}

#[tokio::test]
async fn test_reserve_usage_refused_at_ceiling() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/reserve_daily_usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let usage = store
        .reserve_usage(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 5)
        .await
        .unwrap();

    assert!(usage.is_none());
}

#[tokio::test]
async fn test_release_usage_calls_rpc() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/release_daily_usage"))
        .and(body_partial_json(json!({ "p_today": "2026-10-19" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    store
        .release_usage(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_payment_id_is_encoded_in_filter() {
    let mock_server = MockServer::start().await;
    let store = SupabaseStore::new(&test_config(&mock_server.uri()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/payment_intents"))
        .and(query_param("id", "eq.1&status=eq.approved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let intent = store.get_payment_intent("1&status=eq.approved").await.unwrap();

    assert!(intent.is_none());
}
