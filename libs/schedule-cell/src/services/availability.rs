use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::debug;
use uuid::Uuid;

use shared_database::{BookingStore, StoreResult};
use shared_models::{BookedSlot, BusinessProfile};
use shared_utils::Clock;

use crate::models::{DayStatus, DaySlots, SlotCheck};

/// Whether `date` can offer slots at all, judged against `today` on the
/// professional's calendar.
pub fn day_status(profile: &BusinessProfile, date: NaiveDate, today: NaiveDate) -> DayStatus {
    if date < today {
        DayStatus::Past
    } else if !profile.works_on(date.weekday()) {
        DayStatus::NonWorkingDay
    } else if profile.is_blocked_date(date) {
        DayStatus::BlockedDate
    } else {
        DayStatus::Open
    }
}

/// Whole hours in `[opening, closing)`, before bookings or blocked times are
/// removed.
pub fn working_grid(profile: &BusinessProfile) -> Vec<NaiveTime> {
    let opening = profile.opening_time();
    let closing = profile.closing_time();

    (0..24)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .filter(|slot| *slot >= opening && *slot < closing)
        .collect()
}

/// Bookable hourly slots for `date`, ascending. Pure: the same inputs always
/// yield the same sequence.
pub fn available_slots(
    profile: &BusinessProfile,
    booked: &[BookedSlot],
    date: NaiveDate,
    today: NaiveDate,
) -> Vec<NaiveTime> {
    if day_status(profile, date, today) != DayStatus::Open {
        return Vec::new();
    }

    working_grid(profile)
        .into_iter()
        .filter(|slot| !profile.is_blocked_time(date, *slot))
        .filter(|slot| !booked.iter().any(|b| b.date == date && b.time == *slot))
        .collect()
}

/// Checks a requested slot against the schedule only. Occupancy is decided
/// by the store at insert time.
pub fn check_slot(profile: &BusinessProfile, date: NaiveDate, time: NaiveTime, today: NaiveDate) -> SlotCheck {
    let status = day_status(profile, date, today);
    if status != DayStatus::Open {
        return SlotCheck::DayClosed(status);
    }

    if time.minute() != 0 || time.second() != 0 || !working_grid(profile).contains(&time) {
        return SlotCheck::OutsideWorkingHours;
    }

    if profile.is_blocked_time(date, time) {
        return SlotCheck::BlockedTime;
    }

    SlotCheck::Bookable
}

/// Loads the inputs for `available_slots` from the store.
pub struct AvailabilityService {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The stored profile, or the documented defaults when the professional
    /// never saved one.
    pub async fn profile_for(&self, professional_id: Uuid) -> StoreResult<BusinessProfile> {
        Ok(self.store
            .get_business_profile(professional_id)
            .await?
            .unwrap_or_else(|| BusinessProfile::with_defaults(professional_id)))
    }

    pub async fn slots_for(&self, professional_id: Uuid, date: NaiveDate) -> StoreResult<DaySlots> {
        let profile = self.profile_for(professional_id).await?;
        let today = self.clock.today();
        let status = day_status(&profile, date, today);

        if status != DayStatus::Open {
            debug!("No slots for professional {} on {}: {:?}", professional_id, date, status);
            return Ok(DaySlots { date, status, slots: Vec::new() });
        }

        let booked: Vec<BookedSlot> = self.store
            .booked_times(professional_id, date)
            .await?
            .into_iter()
            .map(|time| BookedSlot { date, time })
            .collect();

        let slots = available_slots(&profile, &booked, date, today);
        debug!("Professional {} has {} free slot(s) on {}", professional_id, slots.len(), date);

        Ok(DaySlots { date, status, slots })
    }
}
