use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{BookingStore, StoreError};
use shared_models::{
    Appointment, AppointmentStatus, GatewayConnection, PaymentIntent,
};
use shared_utils::Clock;

use crate::models::{
    is_payment_id, CreatePaymentRequest, Payer, PaymentError, PaymentResponse, PixPaymentRequest,
    RetrievePaymentRequest,
};
use crate::services::gateway::PaymentGateway;

const DEFAULT_DESCRIPTION: &str = "Agendamento";

/// Creates and re-displays Pix charges for appointments awaiting payment.
pub struct PaymentService {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    notification_url: Option<String>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        notification_url: Option<String>,
    ) -> Self {
        Self { store, gateway, clock, notification_url }
    }

    /// Charges the appointment's stored price. The appointment id is the
    /// gateway idempotency key, so a retried call yields the same charge.
    pub async fn create_intent(&self, request: CreatePaymentRequest) -> Result<PaymentResponse, PaymentError> {
        let appointment = self
            .store
            .get_appointment(request.appointment_id)
            .await?
            .filter(|a| a.professional_id == request.professional_id)
            .ok_or(PaymentError::NotFound)?;

        match appointment.status {
            AppointmentStatus::AguardandoPagamento => {}
            AppointmentStatus::Confirmado => return Err(PaymentError::AlreadyCompleted),
            other => {
                return Err(PaymentError::InvalidState(format!(
                    "appointment {} is {}",
                    appointment.id, other
                )))
            }
        }

        let connection = self.active_connection(request.professional_id).await?;

        if let Some(existing) = self
            .store
            .get_payment_intent_for_appointment(appointment.id)
            .await?
        {
            debug!("Appointment {} already has payment {}, re-displaying", appointment.id, existing.id);
            let payment = self
                .gateway
                .get_payment(&connection.access_token, &existing.id)
                .await?;
            return Ok(payment.into());
        }

        let amount = self
            .store
            .get_business_profile(request.professional_id)
            .await?
            .map(|p| p.price())
            .unwrap_or(0.0);

        if amount <= 0.0 {
            return Err(PaymentError::InvalidState("service has no price".to_string()));
        }

        if let Some(sent) = request.amount {
            if (sent - amount).abs() > f64::EPSILON {
                warn!(
                    "Client sent amount {} for appointment {}, charging stored price {}",
                    sent, appointment.id, amount
                );
            }
        }

        let payer_email = payer_email(&request, &appointment)?;
        let pix = PixPaymentRequest {
            transaction_amount: amount,
            description: request
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            payment_method_id: "pix".to_string(),
            payer: Payer { email: payer_email },
            external_reference: appointment.id.to_string(),
            notification_url: self.notification_url.clone(),
        };

        let idempotency_key = appointment.id.to_string();
        let payment = self
            .gateway
            .create_pix_payment(&connection.access_token, &pix, &idempotency_key)
            .await?;

        let now = self.clock.now();
        let intent = PaymentIntent {
            id: payment.id.clone(),
            appointment_id: appointment.id,
            professional_id: appointment.professional_id,
            status: payment.status,
            amount,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_payment_intent(&intent).await {
            Ok(_) => info!("Created payment {} for appointment {}", intent.id, appointment.id),
            Err(StoreError::UniqueViolation(_)) => {
                debug!("Payment intent for appointment {} recorded by a concurrent request", appointment.id)
            }
            Err(e) => return Err(e.into()),
        }

        Ok(payment.into())
    }

    /// Re-displays an existing charge after a client reload. Never creates a
    /// new charge.
    pub async fn retrieve_intent(&self, request: RetrievePaymentRequest) -> Result<PaymentResponse, PaymentError> {
        let payment_id = request.payment_id.into_string();
        if !is_payment_id(&payment_id) {
            return Err(PaymentError::ValidationError(format!("Invalid payment id: {:?}", payment_id)));
        }

        let connection = self.active_connection(request.professional_id).await?;

        self.store
            .get_payment_intent(&payment_id)
            .await?
            .filter(|intent| intent.professional_id == request.professional_id)
            .ok_or(PaymentError::NotFound)?;

        let payment = self
            .gateway
            .get_payment(&connection.access_token, &payment_id)
            .await?;

        Ok(payment.into())
    }

    async fn active_connection(&self, professional_id: Uuid) -> Result<GatewayConnection, PaymentError> {
        self.store
            .get_gateway_connection(professional_id)
            .await?
            .filter(|c| c.is_active(self.clock.now()))
            .ok_or(PaymentError::Disconnected)
    }
}

fn payer_email(request: &CreatePaymentRequest, appointment: &Appointment) -> Result<String, PaymentError> {
    request
        .payer_email
        .iter()
        .chain(appointment.client_email.iter())
        .map(|e| e.trim())
        .find(|e| !e.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PaymentError::ValidationError("payer email is required".to_string()))
}
