use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{AppointmentStatus, PaymentStatus};

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Professional has no active payment gateway connection")]
    Disconnected,

    #[error("Payment not found")]
    NotFound,

    #[error("Appointment already paid")]
    AlreadyCompleted,

    #[error("Appointment cannot be charged: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<shared_database::StoreError> for PaymentError {
    fn from(err: shared_database::StoreError) -> Self {
        PaymentError::DatabaseError(err.to_string())
    }
}

// ==============================================================================
// GATEWAY CONTRACT
// ==============================================================================

/// Payment ids arrive as JSON numbers from the gateway and as strings from
/// clients and query strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PaymentReference {
    Number(u64),
    Text(String),
}

impl PaymentReference {
    pub fn into_string(self) -> String {
        match self {
            PaymentReference::Number(n) => n.to_string(),
            PaymentReference::Text(s) => s.trim().to_string(),
        }
    }
}

/// Gateway payment ids are short alphanumeric strings. Anything else is
/// refused before it reaches a store filter or a gateway URL.
pub fn is_payment_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PixPaymentRequest {
    pub transaction_amount: f64,
    pub description: String,
    pub payment_method_id: String,
    pub payer: Payer,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Payer {
    pub email: String,
}

/// Gateway-side view of a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub transaction_amount: Option<f64>,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub ticket_url: Option<String>,
}

// ==============================================================================
// HTTP REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub professional_id: Uuid,
    pub appointment_id: Uuid,
    pub payer_email: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RetrieveAction {
    Retrieve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievePaymentRequest {
    pub action: RetrieveAction,
    pub payment_id: PaymentReference,
    pub professional_id: Uuid,
}

/// Body of `POST /payments`: either a retrieval (`action: "retrieve"`) or a
/// creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PaymentCommand {
    Retrieve(RetrievePaymentRequest),
    Create(CreatePaymentRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    pub id: String,
    pub status: PaymentStatus,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub ticket_url: Option<String>,
}

impl From<GatewayPayment> for PaymentResponse {
    fn from(payment: GatewayPayment) -> Self {
        Self {
            id: payment.id,
            status: payment.status,
            qr_code: payment.qr_code,
            qr_code_base64: payment.qr_code_base64,
            ticket_url: payment.ticket_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPaymentRequest {
    pub payment_id: PaymentReference,
}

// ==============================================================================
// RECONCILIATION
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub id: PaymentReference,
}

/// Gateway webhook bodies. The nested form is tried first because it also
/// carries a top-level notification `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Nested {
        data: WebhookData,
        action: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    },
    Direct {
        id: PaymentReference,
        action: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    },
}

/// Legacy query-string notifications: `?data.id=...&type=payment` or
/// `?id=...&topic=payment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub topic: Option<String>,
}

const DEFAULT_ACTION: &str = "payment.updated";

fn normalize_action(action: Option<String>, kind: Option<String>) -> String {
    action
        .filter(|a| !a.trim().is_empty())
        .or_else(|| kind.filter(|k| k != "payment"))
        .unwrap_or_else(|| DEFAULT_ACTION.to_string())
}

/// The single input of the reconciliation state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRequest {
    pub payment_id: String,
    pub action: String,
}

impl ReconciliationRequest {
    pub fn manual(payment_id: PaymentReference) -> Self {
        Self {
            payment_id: payment_id.into_string(),
            action: DEFAULT_ACTION.to_string(),
        }
    }

    pub fn is_payment_event(&self) -> bool {
        self.action.starts_with("payment")
    }
}

impl From<WebhookPayload> for ReconciliationRequest {
    fn from(payload: WebhookPayload) -> Self {
        let (id, action, kind) = match payload {
            WebhookPayload::Nested { data, action, kind } => (data.id, action, kind),
            WebhookPayload::Direct { id, action, kind } => (id, action, kind),
        };

        Self {
            payment_id: id.into_string(),
            action: normalize_action(action, kind),
        }
    }
}

impl WebhookQuery {
    pub fn into_request(self) -> Option<ReconciliationRequest> {
        let payment_id = self.data_id.or(self.id).filter(|id| !id.trim().is_empty())?;
        Some(ReconciliationRequest {
            payment_id: payment_id.trim().to_string(),
            action: normalize_action(None, self.kind.or(self.topic)),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// The appointment moved to `Confirmado` on this call.
    Confirmed { appointment_id: Uuid },
    /// Payment approved but the appointment was already terminal.
    AlreadySettled { appointment_id: Uuid, status: AppointmentStatus },
    /// Gateway status is not approved; the appointment is untouched.
    Pending { appointment_id: Uuid, payment_status: PaymentStatus },
    /// Nothing to act on; acknowledged and dropped.
    Noop { reason: String },
    /// Local state could not be read or written. Safe to redeliver.
    Retry { reason: String },
}

impl ReconciliationOutcome {
    pub fn should_retry(&self) -> bool {
        matches!(self, ReconciliationOutcome::Retry { .. })
    }
}
