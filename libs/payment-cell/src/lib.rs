pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod test_utils;

pub use models::*;
pub use router::payment_routes;
pub use services::*;
pub use state::PaymentState;
