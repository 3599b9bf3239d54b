use async_trait::async_trait;
use tracing::{debug, warn};

use shared_models::Appointment;

use crate::models::{NotificationError, PushMessage};

/// Outbound channels to the professional. Delivery is best-effort: callers
/// go through `announce_*`, which log failures and never propagate them.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Pushes the appointment to the professional's live dashboard.
    async fn broadcast_appointment(&self, appointment: &Appointment) -> Result<(), NotificationError>;

    async fn push(&self, message: &PushMessage) -> Result<(), NotificationError>;
}

pub async fn announce_booking(notifier: &dyn Notifier, appointment: &Appointment) {
    if let Err(e) = notifier.broadcast_appointment(appointment).await {
        warn!("Dashboard broadcast for appointment {} failed: {}", appointment.id, e);
    }

    let message = PushMessage::new_booking(appointment);
    match notifier.push(&message).await {
        Ok(()) => debug!("Booking push sent for appointment {}", appointment.id),
        Err(e) => warn!("Booking push for appointment {} failed: {}", appointment.id, e),
    }
}

pub async fn announce_payment_received(notifier: &dyn Notifier, appointment: &Appointment) {
    if let Err(e) = notifier.broadcast_appointment(appointment).await {
        warn!("Dashboard broadcast for appointment {} failed: {}", appointment.id, e);
    }

    let message = PushMessage::payment_received(appointment);
    match notifier.push(&message).await {
        Ok(()) => debug!("Payment push sent for appointment {}", appointment.id),
        Err(e) => warn!("Payment push for appointment {} failed: {}", appointment.id, e),
    }
}
