pub mod gate;
pub mod gateway;
pub mod intent;
pub mod reconciliation;

pub use gate::{decide, PaymentDecision};
pub use gateway::{MercadoPagoClient, PaymentGateway};
pub use intent::PaymentService;
pub use reconciliation::ReconciliationService;
