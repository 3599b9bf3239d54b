use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use shared_models::Appointment;

use crate::models::{NotificationError, PushMessage};
use crate::services::fanout::Notifier;

/// Notifier that keeps everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    broadcasts: Mutex<Vec<Appointment>>,
    pushes: Mutex<Vec<PushMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery fails from now on; nothing is recorded.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn broadcasts(&self) -> Vec<Appointment> {
        self.broadcasts.lock().expect("notifier lock poisoned").clone()
    }

    pub fn pushes(&self) -> Vec<PushMessage> {
        self.pushes.lock().expect("notifier lock poisoned").clone()
    }

    pub fn pushes_for(&self, professional_id: Uuid) -> Vec<PushMessage> {
        self.pushes()
            .into_iter()
            .filter(|m| m.professional_id == professional_id)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn broadcast_appointment(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Broadcast("realtime unavailable".to_string()));
        }
        self.broadcasts.lock().expect("notifier lock poisoned").push(appointment.clone());
        Ok(())
    }

    async fn push(&self, message: &PushMessage) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Push("push service unavailable".to_string()));
        }
        self.pushes.lock().expect("notifier lock poisoned").push(message.clone());
        Ok(())
    }
}
