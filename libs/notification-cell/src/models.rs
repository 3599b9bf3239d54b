use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{time_format, Appointment, AppointmentStatus};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Realtime broadcast failed: {0}")]
    Broadcast(String),

    #[error("Push delivery failed: {0}")]
    Push(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub professional_id: Uuid,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
}

impl PushMessage {
    /// Message for a freshly booked appointment; wording depends on whether
    /// payment is still outstanding.
    pub fn new_booking(appointment: &Appointment) -> Self {
        let when = format!(
            "{} às {}",
            appointment.date.format("%d/%m/%Y"),
            time_format::format_time_of_day(&appointment.time)
        );

        let (title, body) = match appointment.status {
            AppointmentStatus::AguardandoPagamento => (
                "Novo agendamento aguardando pagamento",
                format!("{} agendou para {}. Aguardando pagamento via Pix.", appointment.client_name, when),
            ),
            _ => (
                "Novo agendamento confirmado",
                format!("{} agendou para {}.", appointment.client_name, when),
            ),
        };

        Self {
            professional_id: appointment.professional_id,
            title: title.to_string(),
            body,
            url: Some("/dashboard".to_string()),
        }
    }

    pub fn payment_received(appointment: &Appointment) -> Self {
        Self {
            professional_id: appointment.professional_id,
            title: "Pagamento recebido".to_string(),
            body: format!(
                "Pagamento de {} confirmado para {} às {}.",
                appointment.client_name,
                appointment.date.format("%d/%m/%Y"),
                time_format::format_time_of_day(&appointment.time)
            ),
            url: Some("/dashboard".to_string()),
        }
    }
}

/// Realtime channel carrying a professional's dashboard events.
pub fn dashboard_topic(professional_id: Uuid) -> String {
    format!("appointments:{}", professional_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn appointment(status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            client_name: "Ana".to_string(),
            client_phone: "11999990000".to_string(),
            client_email: None,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status,
            link_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_booking_message_variants() {
        let pending = PushMessage::new_booking(&appointment(AppointmentStatus::AguardandoPagamento));
        assert!(pending.title.contains("aguardando pagamento"));
        assert!(pending.body.contains("20/10/2026 às 10:00"));

        let confirmed = PushMessage::new_booking(&appointment(AppointmentStatus::Confirmado));
        assert_eq!(confirmed.title, "Novo agendamento confirmado");
    }
}
