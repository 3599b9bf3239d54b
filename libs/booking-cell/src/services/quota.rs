use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use shared_database::BookingStore;
use shared_models::{Plan, UsageProfile};
use shared_utils::Clock;

use crate::models::{BookingError, TRIAL_DAILY_LIMIT};

/// Daily booking ceiling for trial professionals.
///
/// A booking reserves its unit of usage up front with one conditional
/// statement in the store, so concurrent bookings cannot pass the ceiling.
/// A booking that fails after reserving gives the unit back.
pub struct QuotaTracker {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current usage profile with an expired premium plan already reverted.
    pub async fn current(&self, professional_id: Uuid) -> Result<UsageProfile, BookingError> {
        let Some(mut usage) = self.store.get_usage_profile(professional_id).await? else {
            return Ok(UsageProfile::new_trial(professional_id));
        };

        if usage.premium_expired(self.clock.now()) {
            info!("Premium plan of professional {} expired, reverting to trial", professional_id);
            self.store.revert_premium(professional_id).await?;
            usage.plan = Plan::Trial;
            usage.premium_expires_at = None;
        }

        Ok(usage)
    }

    /// Counts one booking for today, or fails with `QuotaExceeded` when a
    /// trial professional is already at the ceiling.
    pub async fn reserve(&self, professional_id: Uuid) -> Result<UsageProfile, BookingError> {
        // Persists an expired premium revert before the store applies the ceiling.
        self.current(professional_id).await?;

        match self
            .store
            .reserve_usage(professional_id, self.clock.today(), TRIAL_DAILY_LIMIT)
            .await?
        {
            Some(usage) => {
                debug!("Professional {} usage today: {}", professional_id, usage.daily_usage);
                Ok(usage)
            }
            None => {
                debug!("Professional {} reached the trial limit", professional_id);
                Err(BookingError::QuotaExceeded)
            }
        }
    }

    /// Returns a reservation whose booking did not go through.
    pub async fn release(&self, professional_id: Uuid) {
        if let Err(e) = self.store.release_usage(professional_id, self.clock.today()).await {
            error!(
                "Failed to release usage reservation for professional {}, counter is one too high: {}",
                professional_id, e
            );
        }
    }
}
