use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use shared_database::BookingStore;
use shared_models::{AppointmentStatus, OneTimeLink};

use crate::models::{BookingError, LinkState};

/// Issues and resolves single-use booking links.
///
/// A used link whose appointment still awaits payment resolves to
/// `Recoverable` so the client can reopen the payment screen after a reload.
/// The pairing of link and appointment, not the link alone, is what is single
/// use: the token takes part in one booking and, at most, one payment resume.
pub struct LinkService {
    store: Arc<dyn BookingStore>,
}

/// Tokens that are not UUIDs cannot name a link.
pub fn parse_token(raw: &str) -> Result<Uuid, BookingError> {
    Uuid::parse_str(raw.trim()).map_err(|_| BookingError::InvalidLink)
}

impl LinkService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn issue(&self, professional_id: Uuid) -> Result<OneTimeLink, BookingError> {
        let link = self.store.insert_link(&OneTimeLink::new(professional_id)).await?;
        info!("Issued booking link {} for professional {}", link.id, professional_id);
        Ok(link)
    }

    pub async fn inspect(&self, token: Uuid) -> Result<LinkState, BookingError> {
        let link = self
            .store
            .get_link(token)
            .await?
            .ok_or(BookingError::InvalidLink)?;

        if !link.is_used {
            return Ok(LinkState::Valid { professional_id: link.professional_id });
        }

        let Some(appointment_id) = link.appointment_id else {
            return Err(BookingError::UsedLink);
        };

        let Some(appointment) = self.store.get_appointment(appointment_id).await? else {
            debug!("Link {} points at missing appointment {}", token, appointment_id);
            return Err(BookingError::UsedLink);
        };

        match appointment.status {
            AppointmentStatus::AguardandoPagamento => {
                let payment_id = self
                    .store
                    .get_payment_intent_for_appointment(appointment.id)
                    .await?
                    .map(|intent| intent.id);

                Ok(LinkState::Recoverable {
                    professional_id: link.professional_id,
                    appointment,
                    payment_id,
                })
            }
            AppointmentStatus::Confirmado => Err(BookingError::AlreadyCompleted),
            _ => Err(BookingError::UsedLink),
        }
    }

    /// Resolves a link that must still be bookable.
    pub async fn require_bookable(&self, token: Uuid) -> Result<Uuid, BookingError> {
        match self.inspect(token).await? {
            LinkState::Valid { professional_id } => Ok(professional_id),
            LinkState::Recoverable { .. } => Err(BookingError::UsedLink),
        }
    }
}
