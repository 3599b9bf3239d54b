use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::services::{announce_booking, Notifier, SupabaseNotifier};
use notification_cell::test_utils::RecordingNotifier;
use notification_cell::{NotificationError, PushMessage};
use shared_models::AppointmentStatus;
use shared_utils::test_utils::{appointment, hour, TestConfig};

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

#[tokio::test]
async fn test_broadcast_targets_professional_topic() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();

    let professional_id = Uuid::new_v4();
    let booked = appointment(professional_id, tuesday(), hour(10), AppointmentStatus::Confirmado);

    Mock::given(method("POST"))
        .and(path("/realtime/v1/api/broadcast"))
        .and(header("apikey", "test-service-role-key"))
        .and(body_partial_json(json!({
            "messages": [{ "topic": format!("appointments:{}", professional_id) }]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = SupabaseNotifier::new(&config);
    notifier.broadcast_appointment(&booked).await.unwrap();
}

#[tokio::test]
async fn test_push_goes_to_edge_function() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();

    let booked = appointment(Uuid::new_v4(), tuesday(), hour(14), AppointmentStatus::AguardandoPagamento);

    Mock::given(method("POST"))
        .and(path("/functions/v1/send-push"))
        .and(body_partial_json(json!({ "title": "Novo agendamento aguardando pagamento" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sent": 1 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notifier = SupabaseNotifier::new(&config);
    notifier.push(&PushMessage::new_booking(&booked)).await.unwrap();
}

#[tokio::test]
async fn test_slow_push_is_bounded_by_timeout() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config.http_timeout_secs = 1;

    Mock::given(method("POST"))
        .and(path("/functions/v1/send-push"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let booked = appointment(Uuid::new_v4(), tuesday(), hour(9), AppointmentStatus::Confirmado);
    let notifier = SupabaseNotifier::new(&config);

    let started = Instant::now();
    let result = notifier.push(&PushMessage::new_booking(&booked)).await;

    assert!(matches!(result, Err(NotificationError::Push(_))));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_announce_swallows_failures() {
    let booked = appointment(Uuid::new_v4(), tuesday(), hour(9), AppointmentStatus::Confirmado);
    let notifier = RecordingNotifier::failing();

    announce_booking(&notifier, &booked).await;

    assert!(notifier.pushes().is_empty());
}

#[tokio::test]
async fn test_announce_sends_broadcast_and_push() {
    let professional_id = Uuid::new_v4();
    let booked = appointment(professional_id, tuesday(), hour(9), AppointmentStatus::Confirmado);
    let notifier = RecordingNotifier::new();

    announce_booking(&notifier, &booked).await;

    assert_eq!(notifier.broadcasts().len(), 1);
    assert_eq!(notifier.pushes_for(professional_id).len(), 1);
}
