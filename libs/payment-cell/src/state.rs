use std::sync::Arc;

use notification_cell::services::Notifier;
use shared_config::AppConfig;
use shared_database::BookingStore;
use shared_utils::Clock;

use crate::services::{PaymentGateway, PaymentService, ReconciliationService};

pub struct PaymentState {
    pub config: Arc<AppConfig>,
    pub payments: PaymentService,
    pub reconciliation: ReconciliationService,
}

impl PaymentState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let payments = PaymentService::new(
            store.clone(),
            gateway.clone(),
            clock,
            config.payment_notification_url.clone(),
        );
        let reconciliation = ReconciliationService::new(store, gateway, notifier);

        Self { config, payments, reconciliation }
    }
}
