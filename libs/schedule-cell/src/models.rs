use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use shared_models::time_format;

/// Why a calendar day does or does not offer slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Open,
    Past,
    NonWorkingDay,
    BlockedDate,
}

/// Outcome of checking one requested slot against the schedule, ignoring
/// existing bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCheck {
    Bookable,
    DayClosed(DayStatus),
    OutsideWorkingHours,
    BlockedTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub status: DayStatus,
    #[serde(serialize_with = "serialize_times")]
    pub slots: Vec<NaiveTime>,
}

fn serialize_times<S: serde::Serializer>(times: &[NaiveTime], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(times.iter().map(time_format::format_time_of_day))
}
