//! Time-of-day serde helpers.
//!
//! Postgres `time` columns come back as `HH:MM:SS`, while values edited from
//! the dashboard (blocked times in particular) are stored as `HH:MM`. Both
//! forms are accepted on input; output is always `HH:MM`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveTime;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

pub fn format_time_of_day(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_time_of_day(time))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_time_of_day(&raw).ok_or_else(|| D::Error::custom(format!("invalid time of day: {}", raw)))
}

/// Weekday (0 = Sunday) to blocked times.
pub mod weekday_times {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &BTreeMap<u8, BTreeSet<NaiveTime>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(value.len()))?;
        for (weekday, times) in value {
            let formatted: Vec<String> = times.iter().map(format_time_of_day).collect();
            map.serialize_entry(&weekday.to_string(), &formatted)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<u8, BTreeSet<NaiveTime>>, D::Error> {
        let raw: Option<BTreeMap<String, Vec<String>>> = Option::deserialize(deserializer)?;
        let mut parsed = BTreeMap::new();

        for (key, times) in raw.unwrap_or_default() {
            let weekday: u8 = key
                .parse()
                .ok()
                .filter(|day| *day <= 6)
                .ok_or_else(|| D::Error::custom(format!("invalid weekday key: {}", key)))?;

            let set = times
                .iter()
                .map(|t| {
                    parse_time_of_day(t)
                        .ok_or_else(|| D::Error::custom(format!("invalid time of day: {}", t)))
                })
                .collect::<Result<BTreeSet<_>, _>>()?;

            parsed.insert(weekday, set);
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_both_forms() {
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(parse_time_of_day("10:00"), Some(ten));
        assert_eq!(parse_time_of_day("10:00:00"), Some(ten));
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("ten"), None);
    }
}
