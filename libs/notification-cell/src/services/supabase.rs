use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::Appointment;

use crate::models::{dashboard_topic, NotificationError, PushMessage};
use crate::services::fanout::Notifier;

/// Realtime broadcast plus the push edge function, both on Supabase.
pub struct SupabaseNotifier {
    supabase: SupabaseClient,
    push_function_path: String,
}

impl SupabaseNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            push_function_path: config.push_function_path.clone(),
        }
    }
}

#[async_trait]
impl Notifier for SupabaseNotifier {
    async fn broadcast_appointment(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        let body = json!({
            "messages": [{
                "topic": dashboard_topic(appointment.professional_id),
                "event": "appointment_changed",
                "payload": appointment,
            }]
        });

        self.supabase
            .execute(Method::POST, "/realtime/v1/api/broadcast", Some(body))
            .await
            .map_err(|e| NotificationError::Broadcast(e.to_string()))?;

        debug!("Broadcast appointment {} to {}", appointment.id, dashboard_topic(appointment.professional_id));
        Ok(())
    }

    async fn push(&self, message: &PushMessage) -> Result<(), NotificationError> {
        let body = serde_json::to_value(message)
            .map_err(|e| NotificationError::Push(e.to_string()))?;

        self.supabase
            .execute(Method::POST, &self.push_function_path, Some(body))
            .await
            .map_err(|e| NotificationError::Push(e.to_string()))
    }
}
