use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time_format;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "time_format")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub link_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Pendente,
    AguardandoPagamento,
    Confirmado,
    Cancelado,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pendente => "Pendente",
            AppointmentStatus::AguardandoPagamento => "AguardandoPagamento",
            AppointmentStatus::Confirmado => "Confirmado",
            AppointmentStatus::Cancelado => "Cancelado",
        }
    }

    /// Anything but `Cancelado` holds its slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelado)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (date, time-of-day) pair held by a non-cancelled appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookedSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

// ==============================================================================
// BUSINESS PROFILE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkingDays {
    pub sunday: bool,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
}

impl Default for WorkingDays {
    fn default() -> Self {
        Self {
            sunday: false,
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: false,
        }
    }
}

impl WorkingDays {
    pub fn is_enabled(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Sun => self.sunday,
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
        }
    }
}

/// Professional-owned scheduling configuration. Missing columns fall back to
/// 09:00-17:00, Monday to Friday, free of charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessProfile {
    pub professional_id: Uuid,
    #[serde(default)]
    pub working_days: Option<WorkingDays>,
    #[serde(default, with = "optional_time")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "optional_time")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub blocked_dates: Option<BTreeSet<NaiveDate>>,
    #[serde(default, with = "time_format::weekday_times")]
    pub blocked_times: BTreeMap<u8, BTreeSet<NaiveTime>>,
    #[serde(default)]
    pub service_price: Option<f64>,
}

impl BusinessProfile {
    pub fn with_defaults(professional_id: Uuid) -> Self {
        Self {
            professional_id,
            working_days: None,
            start_time: None,
            end_time: None,
            blocked_dates: None,
            blocked_times: BTreeMap::new(),
            service_price: None,
        }
    }

    pub fn opening_time(&self) -> NaiveTime {
        self.start_time
            .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn closing_time(&self) -> NaiveTime {
        self.end_time
            .unwrap_or_else(|| NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn works_on(&self, weekday: Weekday) -> bool {
        match &self.working_days {
            Some(days) => days.is_enabled(weekday),
            None => WorkingDays::default().is_enabled(weekday),
        }
    }

    pub fn is_blocked_date(&self, date: NaiveDate) -> bool {
        self.blocked_dates
            .as_ref()
            .map(|dates| dates.contains(&date))
            .unwrap_or(false)
    }

    pub fn is_blocked_time(&self, date: NaiveDate, time: NaiveTime) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.blocked_times
            .get(&weekday)
            .map(|times| times.contains(&time))
            .unwrap_or(false)
    }

    /// Price as charged; negative or missing values mean free.
    pub fn price(&self) -> f64 {
        self.service_price.filter(|price| *price > 0.0).unwrap_or(0.0)
    }
}

mod optional_time {
    use chrono::NaiveTime;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::time_format::{format_time_of_day, parse_time_of_day};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_some(&format_time_of_day(time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_time_of_day(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid time of day: {}", raw))),
            None => Ok(None),
        }
    }
}

// ==============================================================================
// ONE-TIME LINKS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneTimeLink {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub is_used: bool,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl OneTimeLink {
    pub fn new(professional_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            professional_id,
            is_used: false,
            appointment_id: None,
            created_at: Utc::now(),
        }
    }
}

// ==============================================================================
// USAGE QUOTA
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Trial,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageProfile {
    pub professional_id: Uuid,
    pub plan: Plan,
    #[serde(default)]
    pub daily_usage: i32,
    pub last_usage_date: Option<NaiveDate>,
    pub premium_expires_at: Option<DateTime<Utc>>,
}

impl UsageProfile {
    pub fn new_trial(professional_id: Uuid) -> Self {
        Self {
            professional_id,
            plan: Plan::Trial,
            daily_usage: 0,
            last_usage_date: None,
            premium_expires_at: None,
        }
    }

    /// Bookings already counted for `today`; a stale date means the counter
    /// has rolled over.
    pub fn usage_on(&self, today: NaiveDate) -> i32 {
        match self.last_usage_date {
            Some(date) if date == today => self.daily_usage,
            _ => 0,
        }
    }

    pub fn premium_expired(&self, now: DateTime<Utc>) -> bool {
        self.plan == Plan::Premium
            && self.premium_expires_at.map(|expiry| expiry <= now).unwrap_or(false)
    }
}
