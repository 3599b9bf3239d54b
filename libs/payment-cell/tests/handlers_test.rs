use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use notification_cell::test_utils::RecordingNotifier;
use payment_cell::test_utils::FakeGateway;
use payment_cell::{payment_routes, PaymentState};
use shared_models::{AppointmentStatus, PaymentIntent, PaymentStatus};
use shared_utils::test_utils::{appointment, business_profile, gateway_connection, hour, InMemoryStore, TestConfig};
use shared_utils::FixedClock;

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    gateway: Arc<FakeGateway>,
    professional_id: Uuid,
    appointment_id: Uuid,
}

fn create_test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(FakeGateway::new());
    let professional_id = Uuid::new_v4();

    store.put_business_profile(business_profile(professional_id, Some(25.0)));
    store.put_gateway_connection(gateway_connection(professional_id));

    let booked = appointment(
        professional_id,
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        hour(10),
        AppointmentStatus::AguardandoPagamento,
    );
    let appointment_id = booked.id;
    store.put_appointment(booked);

    let state = PaymentState::new(
        TestConfig::default().to_arc(),
        store.clone(),
        gateway.clone(),
        Arc::new(RecordingNotifier::new()),
        Arc::new(FixedClock::new(Utc::now(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())),
    );

    TestApp {
        router: payment_routes(Arc::new(state)),
        store,
        gateway,
        professional_id,
        appointment_id,
    }
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

impl TestApp {
    fn seed_intent(&self, payment_id: &str, gateway_status: PaymentStatus) {
        self.gateway.put_payment(payment_id, gateway_status);
        self.store.put_payment_intent(PaymentIntent {
            id: payment_id.to_string(),
            appointment_id: self.appointment_id,
            professional_id: self.professional_id,
            status: PaymentStatus::Pending,
            amount: 25.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
    }
}

#[tokio::test]
async fn test_create_payment_returns_qr_code() {
    let app = create_test_app();

    let request = json_request(
        "/",
        json!({
            "amount": 25.0,
            "description": "Consulta",
            "professionalId": app.professional_id,
            "appointmentId": app.appointment_id,
            "payerEmail": "cliente@example.com"
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body["qr_code"].is_string());
    assert!(body["qr_code_base64"].is_string());
    assert!(body["ticket_url"].is_string());
}

#[tokio::test]
async fn test_retrieve_action_for_unknown_payment_is_not_found() {
    let app = create_test_app();

    let request = json_request(
        "/",
        json!({
            "action": "retrieve",
            "paymentId": "123",
            "professionalId": app.professional_id
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Pagamento não encontrado");
}

#[tokio::test]
async fn test_create_payment_when_disconnected_is_conflict() {
    let app = create_test_app();
    app.store.remove_gateway_connection(app.professional_id);

    let request = json_request(
        "/",
        json!({
            "professionalId": app.professional_id,
            "appointmentId": app.appointment_id,
            "payerEmail": "cliente@example.com"
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_gateway_outage_is_bad_gateway() {
    let app = create_test_app();
    app.gateway.set_unavailable(true);

    let request = json_request(
        "/",
        json!({
            "professionalId": app.professional_id,
            "appointmentId": app.appointment_id,
            "payerEmail": "cliente@example.com"
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_webhook_nested_shape_confirms_appointment() {
    let app = create_test_app();
    app.seed_intent("5001", PaymentStatus::Approved);

    let request = json_request(
        "/webhook",
        json!({
            "id": 99887766,
            "action": "payment.updated",
            "type": "payment",
            "data": { "id": "5001" }
        }),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["result"]["outcome"], "confirmed");
    assert_eq!(
        app.store.appointment(app.appointment_id).unwrap().status,
        AppointmentStatus::Confirmado
    );
}

#[tokio::test]
async fn test_webhook_direct_shape_is_idempotent() {
    let app = create_test_app();
    app.seed_intent("5002", PaymentStatus::Approved);

    for expected in ["confirmed", "already_settled"] {
        let request = json_request("/webhook", json!({ "id": 5002, "action": "payment.updated" }));
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["result"]["outcome"], expected);
    }

    assert_eq!(
        app.store.appointment(app.appointment_id).unwrap().status,
        AppointmentStatus::Confirmado
    );
}

#[tokio::test]
async fn test_webhook_query_form() {
    let app = create_test_app();
    app.seed_intent("5003", PaymentStatus::Approved);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook?data.id=5003&type=payment")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["result"]["outcome"], "confirmed");
}

#[tokio::test]
async fn test_webhook_for_unknown_payment_still_acknowledges() {
    let app = create_test_app();

    let request = json_request("/webhook", json!({ "data": { "id": "404404" }, "type": "payment" }));
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["result"]["outcome"], "noop");
}

#[tokio::test]
async fn test_webhook_asks_for_redelivery_when_confirmation_fails() {
    let app = create_test_app();
    app.seed_intent("5009", PaymentStatus::Approved);
    app.store.fail_next_transition();

    let request = json_request("/webhook", json!({ "data": { "id": "5009" }, "type": "payment" }));
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["result"]["outcome"], "retry");
    assert_eq!(
        app.store.appointment(app.appointment_id).unwrap().status,
        AppointmentStatus::AguardandoPagamento
    );

    let request = json_request("/webhook", json!({ "data": { "id": "5009" }, "type": "payment" }));
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["result"]["outcome"], "confirmed");
}

#[tokio::test]
async fn test_check_with_filter_characters_in_id_is_ignored() {
    let app = create_test_app();
    app.seed_intent("5010", PaymentStatus::Approved);

    let request = json_request("/check", json!({ "paymentId": "5010&status=eq.approved" }));
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["outcome"], "noop");
    assert_eq!(
        app.store.appointment(app.appointment_id).unwrap().status,
        AppointmentStatus::AguardandoPagamento
    );
}

#[tokio::test]
async fn test_webhook_with_unreadable_body_acknowledges() {
    let app = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .body(Body::from("<xml/>"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["received"], true);
}

#[tokio::test]
async fn test_check_pending_payment_reports_pending() {
    let app = create_test_app();
    app.seed_intent("5004", PaymentStatus::Pending);

    let request = json_request("/check", json!({ "paymentId": "5004" }));
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["outcome"], "pending");
    assert_eq!(body["payment_status"], "pending");
    assert_eq!(
        app.store.appointment(app.appointment_id).unwrap().status,
        AppointmentStatus::AguardandoPagamento
    );
}
