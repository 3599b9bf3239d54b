use std::sync::Arc;

use tracing::{debug, error, info, warn};

use notification_cell::services::{announce_payment_received, Notifier};
use shared_database::BookingStore;
use shared_models::{AppointmentStatus, PaymentStatus};

use crate::models::{is_payment_id, ReconciliationOutcome, ReconciliationRequest};
use crate::services::gateway::PaymentGateway;

/// States a payment approval may confirm from.
const CONFIRMABLE: [AppointmentStatus; 2] = [
    AppointmentStatus::AguardandoPagamento,
    AppointmentStatus::Pendente,
];

/// Applies gateway-authoritative payment status to local appointment state.
///
/// Webhooks, the manual "I already paid" check and client polling all land
/// here. The gateway is always re-queried, so the incoming request only needs
/// to name a payment. `reconcile` never fails: anything it cannot act on is
/// logged and reported as `Noop`, which the HTTP layer acknowledges with 200.
/// Storage failures are reported as `Retry` so the sender redelivers; every
/// step is idempotent.
pub struct ReconciliationService {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { store, gateway, notifier }
    }

    pub async fn reconcile(&self, request: ReconciliationRequest) -> ReconciliationOutcome {
        if !request.is_payment_event() {
            debug!("Ignoring non-payment notification '{}' for {}", request.action, request.payment_id);
            return noop(format!("ignored action {}", request.action));
        }

        if !is_payment_id(&request.payment_id) {
            warn!("Ignoring malformed payment id {:?}", request.payment_id);
            return noop("malformed payment id");
        }

        let intent = match self.store.get_payment_intent(&request.payment_id).await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                info!("No local payment intent for gateway payment {}", request.payment_id);
                return noop("unknown payment");
            }
            Err(e) => {
                error!("Failed to load payment intent {}: {}", request.payment_id, e);
                return retry("payment lookup failed");
            }
        };

        let connection = match self.store.get_gateway_connection(intent.professional_id).await {
            Ok(Some(connection)) if !connection.access_token.trim().is_empty() => connection,
            Ok(_) => {
                warn!(
                    "Professional {} has no gateway connection, cannot reconcile payment {}",
                    intent.professional_id, intent.id
                );
                return noop("gateway disconnected");
            }
            Err(e) => {
                error!("Failed to load gateway connection for {}: {}", intent.professional_id, e);
                return retry("connection lookup failed");
            }
        };

        let payment = match self.gateway.get_payment(&connection.access_token, &intent.id).await {
            Ok(payment) => payment,
            Err(e) => {
                warn!("Could not fetch payment {} from gateway: {}", intent.id, e);
                return noop("gateway unavailable");
            }
        };

        if payment.status != intent.status {
            if let Err(e) = self.store.update_payment_status(&intent.id, payment.status).await {
                error!("Failed to record status {} for payment {}: {}", payment.status, intent.id, e);
            }
        }

        if !payment.status.is_approved() {
            debug!("Payment {} is {}, appointment {} unchanged", intent.id, payment.status, intent.appointment_id);
            return ReconciliationOutcome::Pending {
                appointment_id: intent.appointment_id,
                payment_status: payment.status,
            };
        }

        self.confirm(intent.appointment_id, &intent.id, payment.status).await
    }

    async fn confirm(
        &self,
        appointment_id: uuid::Uuid,
        payment_id: &str,
        payment_status: PaymentStatus,
    ) -> ReconciliationOutcome {
        let transitioned = match self
            .store
            .transition_appointment(appointment_id, AppointmentStatus::Confirmado, &CONFIRMABLE)
            .await
        {
            Ok(transitioned) => transitioned,
            Err(e) => {
                error!(
                    "Payment {} is {} but appointment {} could not be confirmed: {}",
                    payment_id, payment_status, appointment_id, e
                );
                return retry("appointment update failed");
            }
        };

        if let Some(appointment) = transitioned {
            info!("Payment {} approved, appointment {} confirmed", payment_id, appointment.id);
            announce_payment_received(self.notifier.as_ref(), &appointment).await;
            return ReconciliationOutcome::Confirmed { appointment_id: appointment.id };
        }

        match self.store.get_appointment(appointment_id).await {
            Ok(Some(appointment)) => {
                if appointment.status == AppointmentStatus::Cancelado {
                    warn!(
                        "Payment {} approved for cancelled appointment {}, refund may be needed",
                        payment_id, appointment.id
                    );
                }
                ReconciliationOutcome::AlreadySettled {
                    appointment_id: appointment.id,
                    status: appointment.status,
                }
            }
            Ok(None) => {
                warn!("Payment {} approved but appointment {} no longer exists", payment_id, appointment_id);
                noop("appointment not found")
            }
            Err(e) => {
                error!("Failed to reload appointment {}: {}", appointment_id, e);
                retry("appointment lookup failed")
            }
        }
    }
}

fn noop(reason: impl Into<String>) -> ReconciliationOutcome {
    ReconciliationOutcome::Noop { reason: reason.into() }
}

fn retry(reason: impl Into<String>) -> ReconciliationOutcome {
    ReconciliationOutcome::Retry { reason: reason.into() }
}
