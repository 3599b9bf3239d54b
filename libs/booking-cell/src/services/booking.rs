use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use notification_cell::services::{announce_booking, Notifier};
use payment_cell::services::{decide, PaymentDecision};
use schedule_cell::{check_slot, AvailabilityService, DayStatus, SlotCheck};
use shared_database::{BookingStore, StoreError};
use shared_models::{Appointment, AppointmentStatus, BusinessProfile};
use shared_utils::Clock;

use crate::models::{
    BookingError, BookingOutcome, BookingRequest, ClientDetails, DashboardBookingRequest,
};
use crate::services::links::{parse_token, LinkService};
use crate::services::quota::QuotaTracker;

const CANCELLABLE: [AppointmentStatus; 3] = [
    AppointmentStatus::Pendente,
    AppointmentStatus::AguardandoPagamento,
    AppointmentStatus::Confirmado,
];

const MANUALLY_CONFIRMABLE: [AppointmentStatus; 2] = [
    AppointmentStatus::Pendente,
    AppointmentStatus::AguardandoPagamento,
];

/// Creates appointments and applies the professional's own status changes.
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    links: LinkService,
    quota: QuotaTracker,
    availability: AvailabilityService,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            links: LinkService::new(store.clone()),
            quota: QuotaTracker::new(store.clone(), clock.clone()),
            availability: AvailabilityService::new(store.clone(), clock.clone()),
            store,
            notifier,
            clock,
        }
    }

    pub fn links(&self) -> &LinkService {
        &self.links
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    /// Public booking through a one-time link.
    ///
    /// Usage is reserved first, then the appointment is inserted and the
    /// link consumed. Any failure after the reservation releases it, and a
    /// lost consume race deletes the appointment again, so a returned
    /// appointment always owns its link and is counted exactly once.
    pub async fn book(&self, request: BookingRequest) -> Result<BookingOutcome, BookingError> {
        let details = request.details()?;
        let token = parse_token(&request.token_id)?;
        let professional_id = self.links.require_bookable(token).await?;

        self.quota.reserve(professional_id).await?;

        let (appointment, decision) = match self.place(professional_id, token, details).await {
            Ok(placed) => placed,
            Err(e) => {
                self.quota.release(professional_id).await;
                return Err(e);
            }
        };

        match self.store.consume_link(token, appointment.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Link {} consumed concurrently, releasing appointment {}", token, appointment.id);
                self.abandon(&appointment).await;
                return Err(BookingError::UsedLink);
            }
            Err(e) => self.settle_failed_consume(token, &appointment, e).await?,
        }

        info!(
            "Booked appointment {} for professional {} on {} at {} ({})",
            appointment.id, professional_id, appointment.date, appointment.time, appointment.status
        );

        announce_booking(self.notifier.as_ref(), &appointment).await;

        Ok(BookingOutcome {
            requires_payment: matches!(decision, PaymentDecision::RequiresPayment { .. }),
            amount: decision.amount(),
            appointment,
        })
    }

    /// Booking entered by the professional. Skips links, quota and the
    /// payment gate: the appointment is confirmed on creation. Slot rules and
    /// uniqueness still apply.
    pub async fn book_from_dashboard(
        &self,
        professional_id: Uuid,
        request: DashboardBookingRequest,
    ) -> Result<Appointment, BookingError> {
        let details = request.details()?;

        let profile = self.availability.profile_for(professional_id).await?;
        self.ensure_open_slot(&profile, &details).await?;

        let appointment = self.new_appointment(professional_id, details, AppointmentStatus::Confirmado);
        let appointment = self.insert(&appointment).await?;

        info!("Professional {} booked appointment {} from the dashboard", professional_id, appointment.id);
        announce_booking(self.notifier.as_ref(), &appointment).await;

        Ok(appointment)
    }

    pub async fn list(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError> {
        if to < from {
            return Err(BookingError::ValidationError("Intervalo de datas inválido".to_string()));
        }
        Ok(self.store.list_appointments(professional_id, from, to).await?)
    }

    pub async fn cancel(&self, professional_id: Uuid, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.owned(professional_id, appointment_id).await?;

        match self
            .store
            .transition_appointment(appointment_id, AppointmentStatus::Cancelado, &CANCELLABLE)
            .await?
        {
            Some(appointment) => {
                info!("Appointment {} cancelled by professional {}", appointment_id, professional_id);
                self.broadcast(&appointment).await;
                Ok(appointment)
            }
            None => Err(BookingError::InvalidTransition("agendamento já cancelado".to_string())),
        }
    }

    /// Manual confirmation. Confirming an already confirmed appointment
    /// returns it unchanged.
    pub async fn confirm(&self, professional_id: Uuid, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let current = self.owned(professional_id, appointment_id).await?;

        match self
            .store
            .transition_appointment(appointment_id, AppointmentStatus::Confirmado, &MANUALLY_CONFIRMABLE)
            .await?
        {
            Some(appointment) => {
                info!("Appointment {} confirmed by professional {}", appointment_id, professional_id);
                self.broadcast(&appointment).await;
                Ok(appointment)
            }
            None if current.status == AppointmentStatus::Confirmado => Ok(current),
            None => Err(BookingError::InvalidTransition("agendamento cancelado".to_string())),
        }
    }

    async fn owned(&self, professional_id: Uuid, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .filter(|a| a.professional_id == professional_id)
            .ok_or(BookingError::AppointmentNotFound)
    }

    /// Schedule rules first, then a fresh occupancy read. The insert still
    /// relies on the store's uniqueness guarantee for the final word.
    async fn ensure_open_slot(&self, profile: &BusinessProfile, details: &ClientDetails) -> Result<(), BookingError> {
        match check_slot(profile, details.date, details.time, self.clock.today()) {
            SlotCheck::Bookable => {}
            SlotCheck::DayClosed(DayStatus::Past) => {
                return Err(BookingError::SlotUnavailable("Data já passou".to_string()))
            }
            SlotCheck::DayClosed(DayStatus::NonWorkingDay) => {
                return Err(BookingError::SlotUnavailable("Não há atendimento neste dia".to_string()))
            }
            SlotCheck::DayClosed(_) => {
                return Err(BookingError::SlotUnavailable("Data bloqueada".to_string()))
            }
            SlotCheck::OutsideWorkingHours => {
                return Err(BookingError::SlotUnavailable("Horário fora do expediente".to_string()))
            }
            SlotCheck::BlockedTime => {
                return Err(BookingError::SlotUnavailable("Horário bloqueado".to_string()))
            }
        }

        let occupied = self
            .store
            .find_active_appointment(profile.professional_id, details.date, details.time)
            .await?;

        if occupied.is_some() {
            return Err(BookingError::SlotTaken);
        }
        Ok(())
    }

    /// Slot re-check, payment gate and insert. Nothing here touches the link.
    async fn place(
        &self,
        professional_id: Uuid,
        token: Uuid,
        details: ClientDetails,
    ) -> Result<(Appointment, PaymentDecision), BookingError> {
        let profile = self.availability.profile_for(professional_id).await?;
        self.ensure_open_slot(&profile, &details).await?;

        let connection = self.store.get_gateway_connection(professional_id).await?;
        let decision = decide(&profile, connection.as_ref(), self.clock.now());

        let mut appointment = self.new_appointment(professional_id, details, decision.initial_status());
        appointment.link_id = Some(token);

        let appointment = self.insert(&appointment).await?;
        Ok((appointment, decision))
    }

    /// `consume_link` errored, which does not say whether the update was
    /// applied. The link is read back to decide.
    async fn settle_failed_consume(
        &self,
        token: Uuid,
        appointment: &Appointment,
        error: StoreError,
    ) -> Result<(), BookingError> {
        match self.store.get_link(token).await {
            Ok(Some(link)) if link.is_used && link.appointment_id == Some(appointment.id) => {
                info!(
                    "Link {} was consumed by appointment {} despite the error: {}",
                    token, appointment.id, error
                );
                Ok(())
            }
            Ok(Some(link)) if !link.is_used => {
                warn!("Failed to consume link {}: {}", token, error);
                self.abandon(appointment).await;
                Err(error.into())
            }
            Ok(Some(_)) => {
                debug!("Link {} consumed concurrently, releasing appointment {}", token, appointment.id);
                self.abandon(appointment).await;
                Err(BookingError::UsedLink)
            }
            Ok(None) | Err(_) => {
                error!(
                    "Could not tell whether link {} was consumed by appointment {}, manual reconciliation required: {}",
                    token, appointment.id, error
                );
                Err(error.into())
            }
        }
    }

    /// Undoes a placed booking whose link was not consumed.
    async fn abandon(&self, appointment: &Appointment) {
        self.release(appointment).await;
        self.quota.release(appointment.professional_id).await;
    }

    fn new_appointment(&self, professional_id: Uuid, details: ClientDetails, status: AppointmentStatus) -> Appointment {
        let now = self.clock.now();
        Appointment {
            id: Uuid::new_v4(),
            professional_id,
            client_name: details.name,
            client_phone: details.phone,
            client_email: details.email,
            date: details.date,
            time: details.time,
            status,
            link_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, BookingError> {
        match self.store.insert_appointment(appointment).await {
            Ok(stored) => Ok(stored),
            Err(StoreError::UniqueViolation(_)) => {
                debug!(
                    "Slot {} {} of professional {} taken concurrently",
                    appointment.date, appointment.time, appointment.professional_id
                );
                Err(BookingError::SlotTaken)
            }
            Err(e) => {
                // The insert may have been applied before the error surfaced.
                self.release(appointment).await;
                Err(e.into())
            }
        }
    }

    async fn release(&self, appointment: &Appointment) {
        if let Err(e) = self.store.delete_appointment(appointment.id).await {
            error!(
                "Appointment {} may exist without its link consumed and could not be removed, manual reconciliation required: {}",
                appointment.id, e
            );
        }
    }

    async fn broadcast(&self, appointment: &Appointment) {
        if let Err(e) = self.notifier.broadcast_appointment(appointment).await {
            warn!("Failed to broadcast appointment {}: {}", appointment.id, e);
        }
    }
}
