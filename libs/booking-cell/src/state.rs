use std::sync::Arc;

use notification_cell::services::Notifier;
use shared_config::AppConfig;
use shared_database::BookingStore;
use shared_utils::Clock;

use crate::services::BookingService;

pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub bookings: BookingService,
}

impl BookingState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            bookings: BookingService::new(store, notifier, clock),
        }
    }
}
