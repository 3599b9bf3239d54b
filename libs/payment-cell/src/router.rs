use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers;
use crate::state::PaymentState;

/// Payment endpoints are called by the public booking page and by the
/// gateway, so none of them sit behind the professional JWT.
pub fn payment_routes(state: Arc<PaymentState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_or_retrieve_payment))
        .route("/check", post(handlers::check_payment))
        .route("/webhook", post(handlers::payment_webhook))
        .with_state(state)
}
