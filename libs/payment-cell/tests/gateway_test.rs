use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::services::{MercadoPagoClient, PaymentGateway};
use payment_cell::{Payer, PaymentError, PixPaymentRequest};
use shared_models::PaymentStatus;
use shared_utils::test_utils::TestConfig;

fn client_for(server: &MockServer) -> MercadoPagoClient {
    let config = TestConfig {
        mercadopago_api_url: server.uri(),
        ..TestConfig::default()
    }
    .to_app_config();
    MercadoPagoClient::new(&config)
}

fn pix_request() -> PixPaymentRequest {
    PixPaymentRequest {
        transaction_amount: 25.0,
        description: "Consulta".to_string(),
        payment_method_id: "pix".to_string(),
        payer: Payer { email: "maria@example.com".to_string() },
        external_reference: "7f1c2c1e-3a55-4c7e-9c51-0b2b8f6a1d11".to_string(),
        notification_url: None,
    }
}

fn mp_payment_body(status: &str) -> serde_json::Value {
    json!({
        "id": 123456789u64,
        "status": status,
        "status_detail": "pending_waiting_transfer",
        "transaction_amount": 25.0,
        "point_of_interaction": {
            "type": "PIX",
            "transaction_data": {
                "qr_code": "00020126580014br.gov.bcb.pix",
                "qr_code_base64": "iVBORw0KGgo=",
                "ticket_url": "https://www.mercadopago.com.br/payments/123456789/ticket"
            }
        }
    })
}

#[tokio::test]
async fn test_create_sends_idempotency_key_and_parses_qr() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .and(header("authorization", "Bearer APP_USR-token"))
        .and(header("x-idempotency-key", "appointment-key"))
        .and(body_partial_json(json!({
            "transaction_amount": 25.0,
            "payment_method_id": "pix",
            "payer": { "email": "maria@example.com" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(mp_payment_body("pending")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let payment = client_for(&mock_server)
        .create_pix_payment("APP_USR-token", &pix_request(), "appointment-key")
        .await
        .unwrap();

    assert_eq!(payment.id, "123456789");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.qr_code.as_deref(), Some("00020126580014br.gov.bcb.pix"));
    assert!(payment.ticket_url.is_some());
}

#[tokio::test]
async fn test_notification_url_omitted_when_unset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(mp_payment_body("pending")))
        .mount(&mock_server)
        .await;

    client_for(&mock_server)
        .create_pix_payment("APP_USR-token", &pix_request(), "k")
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("notification_url").is_none());
}

#[tokio::test]
async fn test_get_payment_reads_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payments/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mp_payment_body("approved")))
        .mount(&mock_server)
        .await;

    let payment = client_for(&mock_server)
        .get_payment("APP_USR-token", "123456789")
        .await
        .unwrap();

    assert!(payment.status.is_approved());
}

#[tokio::test]
async fn test_unknown_gateway_status_is_tolerated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payments/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "status": "brand_new_state" })))
        .mount(&mock_server)
        .await;

    let payment = client_for(&mock_server).get_payment("t", "1").await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Unknown);
    assert!(payment.qr_code.is_none());
}

#[tokio::test]
async fn test_gateway_rejection_maps_to_gateway_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "invalid payer email",
            "status": 400
        })))
        .mount(&mock_server)
        .await;

    let result = client_for(&mock_server)
        .create_pix_payment("APP_USR-token", &pix_request(), "k")
        .await;

    assert_matches!(result, Err(PaymentError::GatewayError(msg)) if msg.contains("400"));
}

#[tokio::test]
async fn test_path_injection_is_refused() {
    let mock_server = MockServer::start().await;

    let result = client_for(&mock_server).get_payment("t", "../v1/users").await;

    assert_matches!(result, Err(PaymentError::ValidationError(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
