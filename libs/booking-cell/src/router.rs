use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::BookingState;

/// Endpoints reached through a one-time link. No authentication: the link
/// token is the credential.
pub fn public_routes(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/links/{token}", get(handlers::inspect_link))
        .route("/links/{token}/slots", get(handlers::public_slots))
        .route("/book", post(handlers::public_book))
        .with_state(state)
}

/// Professional dashboard endpoints, behind the Supabase JWT.
pub fn booking_routes(state: Arc<BookingState>) -> Router {
    let protected_routes = Router::new()
        .route("/links", post(handlers::issue_link))
        .route(
            "/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route("/appointments/slots", get(handlers::own_slots))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
