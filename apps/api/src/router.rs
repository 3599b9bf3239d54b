use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::{booking_routes, public_routes, BookingState};
use payment_cell::{payment_routes, PaymentState};

pub fn create_router(bookings: Arc<BookingState>, payments: Arc<PaymentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Agenda API is running!" }))
        .nest("/public", public_routes(bookings.clone()))
        .nest("/payments", payment_routes(payments))
        .merge(booking_routes(bookings))
}
