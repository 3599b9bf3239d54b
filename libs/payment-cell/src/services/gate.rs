use chrono::{DateTime, Utc};
use serde::Serialize;

use shared_models::{AppointmentStatus, BusinessProfile, GatewayConnection};

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PaymentDecision {
    RequiresPayment { amount: f64 },
    Free,
}

impl PaymentDecision {
    pub fn initial_status(&self) -> AppointmentStatus {
        match self {
            PaymentDecision::RequiresPayment { .. } => AppointmentStatus::AguardandoPagamento,
            PaymentDecision::Free => AppointmentStatus::Confirmado,
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            PaymentDecision::RequiresPayment { amount } => Some(*amount),
            PaymentDecision::Free => None,
        }
    }
}

/// Payment is required iff the service has a positive price and the
/// professional has a live gateway connection.
pub fn decide(
    profile: &BusinessProfile,
    connection: Option<&GatewayConnection>,
    now: DateTime<Utc>,
) -> PaymentDecision {
    let price = profile.price();
    let connected = connection.map(|c| c.is_active(now)).unwrap_or(false);

    if price > 0.0 && connected {
        PaymentDecision::RequiresPayment { amount: price }
    } else {
        PaymentDecision::Free
    }
}
