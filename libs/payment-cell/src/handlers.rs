use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_models::error::AppError;

use crate::models::{
    CheckPaymentRequest, PaymentCommand, PaymentError, PaymentResponse, ReconciliationOutcome,
    ReconciliationRequest, WebhookPayload, WebhookQuery,
};
use crate::state::PaymentState;

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::GatewayError(msg) => {
                warn!("Gateway failure: {}", msg);
                AppError::ExternalService("Falha ao comunicar com o gateway de pagamento".to_string())
            }
            PaymentError::Disconnected => {
                AppError::Conflict("Profissional sem conexão ativa com o Mercado Pago".to_string())
            }
            PaymentError::NotFound => AppError::NotFound("Pagamento não encontrado".to_string()),
            PaymentError::AlreadyCompleted => {
                AppError::Conflict("Agendamento já concluído para este link".to_string())
            }
            PaymentError::InvalidState(msg) => AppError::Conflict(msg),
            PaymentError::ValidationError(msg) => AppError::ValidationError(msg),
            PaymentError::DatabaseError(msg) => {
                error!("Payment storage failure: {}", msg);
                AppError::Database("Erro ao acessar os dados do pagamento".to_string())
            }
        }
    }
}

/// `POST /payments`: create a Pix charge, or re-display one with
/// `action: "retrieve"`.
pub async fn create_or_retrieve_payment(
    State(state): State<Arc<PaymentState>>,
    Json(command): Json<PaymentCommand>,
) -> Result<Json<PaymentResponse>, AppError> {
    let response = match command {
        PaymentCommand::Retrieve(request) => state.payments.retrieve_intent(request).await?,
        PaymentCommand::Create(request) => state.payments.create_intent(request).await?,
    };

    Ok(Json(response))
}

/// `POST /payments/check`: manual "I already paid" and client polling.
pub async fn check_payment(
    State(state): State<Arc<PaymentState>>,
    Json(request): Json<CheckPaymentRequest>,
) -> (StatusCode, Json<ReconciliationOutcome>) {
    let outcome = state
        .reconciliation
        .reconcile(ReconciliationRequest::manual(request.payment_id))
        .await;

    (outcome_status(&outcome), Json(outcome))
}

/// `POST /payments/webhook`: gateway push. Answers 200 for anything we
/// cannot act on so the sender stops retrying; only a local storage failure
/// answers 503 and asks for redelivery.
pub async fn payment_webhook(
    State(state): State<Arc<PaymentState>>,
    query: Result<Query<WebhookQuery>, QueryRejection>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let request = parse_webhook(&body, query.ok().map(|Query(q)| q));

    let Some(request) = request else {
        info!("Webhook without a payment reference, acknowledging");
        return (StatusCode::OK, Json(json!({ "received": true })));
    };

    debug!("Webhook {} for payment {}", request.action, request.payment_id);
    let outcome = state.reconciliation.reconcile(request).await;

    (outcome_status(&outcome), Json(json!({ "received": true, "result": outcome })))
}

fn outcome_status(outcome: &ReconciliationOutcome) -> StatusCode {
    if outcome.should_retry() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

fn parse_webhook(body: &[u8], query: Option<WebhookQuery>) -> Option<ReconciliationRequest> {
    if !body.is_empty() {
        match serde_json::from_slice::<WebhookPayload>(body) {
            Ok(payload) => return Some(payload.into()),
            Err(e) => debug!("Webhook body not recognised ({}), trying query string", e),
        }
    }

    query.and_then(WebhookQuery::into_request)
}
