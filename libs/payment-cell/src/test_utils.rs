use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use shared_models::PaymentStatus;

use crate::models::{GatewayPayment, PaymentError, PixPaymentRequest};
use crate::services::gateway::PaymentGateway;

#[derive(Default)]
struct GatewayState {
    payments: HashMap<String, GatewayPayment>,
    by_idempotency_key: HashMap<String, String>,
    requests: Vec<PixPaymentRequest>,
}

/// In-process gateway honouring idempotency keys. Payments start `pending`;
/// tests move them with `set_status`.
pub struct FakeGateway {
    state: Mutex<GatewayState>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            next_id: AtomicU64::new(1_000_000_001),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().expect("gateway lock poisoned")
    }

    pub fn set_status(&self, payment_id: &str, status: PaymentStatus) {
        if let Some(payment) = self.lock().payments.get_mut(payment_id) {
            payment.status = status;
        }
    }

    /// Registers a payment the gateway knows about without going through
    /// `create_pix_payment`.
    pub fn put_payment(&self, payment_id: &str, status: PaymentStatus) {
        self.lock().payments.insert(payment_id.to_string(), pix_payment(payment_id, status, None));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Charges created, not counting idempotent replays.
    pub fn payment_count(&self) -> usize {
        self.lock().by_idempotency_key.len()
    }

    pub fn requests(&self) -> Vec<PixPaymentRequest> {
        self.lock().requests.clone()
    }

    fn check_available(&self) -> Result<(), PaymentError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PaymentError::GatewayError("HTTP 503: service unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_pix_payment(
        &self,
        access_token: &str,
        request: &PixPaymentRequest,
        idempotency_key: &str,
    ) -> Result<GatewayPayment, PaymentError> {
        self.check_available()?;
        if access_token.is_empty() {
            return Err(PaymentError::GatewayError("HTTP 401: unauthorized".to_string()));
        }

        let mut state = self.lock();
        state.requests.push(request.clone());

        if let Some(existing) = state.by_idempotency_key.get(idempotency_key).cloned() {
            if let Some(payment) = state.payments.get(&existing) {
                return Ok(payment.clone());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let payment = pix_payment(&id, PaymentStatus::Pending, Some(request.transaction_amount));
        state.by_idempotency_key.insert(idempotency_key.to_string(), id.clone());
        state.payments.insert(id, payment.clone());

        Ok(payment)
    }

    async fn get_payment(&self, _access_token: &str, payment_id: &str) -> Result<GatewayPayment, PaymentError> {
        self.check_available()?;
        self.lock()
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::GatewayError(format!("HTTP 404: payment {} not found", payment_id)))
    }
}

fn pix_payment(id: &str, status: PaymentStatus, amount: Option<f64>) -> GatewayPayment {
    GatewayPayment {
        id: id.to_string(),
        status,
        transaction_amount: amount,
        qr_code: Some(format!("00020126580014br.gov.bcb.pix0136{}", id)),
        qr_code_base64: Some("iVBORw0KGgo=".to_string()),
        ticket_url: Some(format!("https://www.mercadopago.com.br/payments/{}/ticket", id)),
    }
}
