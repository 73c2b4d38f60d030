use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),
}

/// Formats `base` as an ISO-8601 string.
///
/// Without a zone (or with a blank one) the result is UTC with a `Z` suffix.
/// With a zone the local wall-clock time is rendered with a numeric offset.
pub fn resolve_instant(base: DateTime<Utc>, time_zone: Option<&str>) -> Result<String, TimeError> {
    match time_zone.map(str::trim).filter(|zone| !zone.is_empty()) {
        None => Ok(base.to_rfc3339_opts(SecondsFormat::Secs, true)),
        Some(name) => {
            let zone = parse_zone(name)?;
            Ok(base
                .with_timezone(&zone)
                .format("%Y-%m-%dT%H:%M:%S%:z")
                .to_string())
        }
    }
}

pub fn parse_zone(name: &str) -> Result<Tz, TimeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimeError::InvalidTimeZone(name.to_string()))
}

pub fn shift_days(base: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    base + TimeDelta::milliseconds(days * MILLIS_PER_DAY)
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    pub fn shift_days(self, days: i64) -> Self {
        Self(shift_days(self.0, days))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl std::ops::Deref for Timestamp {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap()
    }

    #[test]
    fn test_resolve_utc_without_zone() {
        assert_eq!(resolve_instant(base(), None).unwrap(), "2024-03-01T10:20:30Z");
    }

    #[test]
    fn test_resolve_blank_zone_is_utc() {
        assert_eq!(
            resolve_instant(base(), Some("   ")).unwrap(),
            "2024-03-01T10:20:30Z"
        );
        assert_eq!(resolve_instant(base(), Some("")).unwrap(), "2024-03-01T10:20:30Z");
    }

    #[test]
    fn test_resolve_drops_subsecond_precision() {
        let instant = base() + TimeDelta::milliseconds(789);
        assert_eq!(resolve_instant(instant, None).unwrap(), "2024-03-01T10:20:30Z");
    }

    #[test]
    fn test_resolve_with_zone() {
        assert_eq!(
            resolve_instant(base(), Some("Asia/Tokyo")).unwrap(),
            "2024-03-01T19:20:30+09:00"
        );
        assert_eq!(
            resolve_instant(base(), Some("America/New_York")).unwrap(),
            "2024-03-01T05:20:30-05:00"
        );
    }

    #[test]
    fn test_resolve_zone_with_daylight_saving() {
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(
            resolve_instant(summer, Some("Europe/Paris")).unwrap(),
            "2024-07-01T14:00:00+02:00"
        );
    }

    #[test]
    fn test_resolve_utc_zone_uses_numeric_offset() {
        assert_eq!(
            resolve_instant(base(), Some("UTC")).unwrap(),
            "2024-03-01T10:20:30+00:00"
        );
    }

    #[test]
    fn test_resolve_round_trips() {
        for zone in ["Asia/Kolkata", "America/Los_Angeles", "Australia/Adelaide"] {
            let rendered = resolve_instant(base(), Some(zone)).unwrap();
            let parsed = DateTime::parse_from_rfc3339(&rendered).unwrap();
            assert_eq!(parsed.with_timezone(&Utc), base());
        }
    }

    #[test]
    fn test_resolve_invalid_zone() {
        assert_eq!(
            resolve_instant(base(), Some("Not/AZone")),
            Err(TimeError::InvalidTimeZone("Not/AZone".to_string()))
        );
    }

    #[test]
    fn test_shift_days() {
        let tomorrow = shift_days(base(), 1);
        assert_eq!(tomorrow, Utc.with_ymd_and_hms(2024, 3, 2, 10, 20, 30).unwrap());
        let yesterday = shift_days(base(), -1);
        assert_eq!(yesterday, Utc.with_ymd_and_hms(2024, 2, 29, 10, 20, 30).unwrap());
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(Timestamp::from(base()));
        assert_eq!(clock.now().hour(), 10);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_timestamp_display() {
        let timestamp = Timestamp::from(base());
        assert_eq!(timestamp.to_string(), "2024-03-01T10:20:30Z");
    }

    #[test]
    fn test_timestamp_shift_days() {
        let timestamp = Timestamp::from(base()).shift_days(2);
        assert_eq!(timestamp.into_inner(), shift_days(base(), 2));
    }

    #[test]
    fn test_timestamp_serde() {
        let timestamp = Timestamp::from(base());
        let serialized = serde_json::to_string(&timestamp).unwrap();
        assert_eq!(serialized, "\"2024-03-01T10:20:30Z\"");
        let deserialized: Timestamp = serde_json::from_str(&serialized).unwrap();
        assert_eq!(timestamp, deserialized);
    }
}
