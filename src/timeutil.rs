//! Timezone conversion tools so the agent can reason about local time
//! while everything persisted stays UTC.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::agent::capability::{Capability, EmptyParams};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct TimeTools {
    zone: Tz,
}

impl TimeTools {
    /// `zone` is an IANA name like `Europe/Amsterdam`.
    pub fn new(zone: &str) -> Result<Self> {
        let zone = Tz::from_str(zone)
            .map_err(|_| Error::Parse(format!("unknown timezone: {zone}")))?;
        Ok(TimeTools { zone })
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Interpret a local timestamp in the user's zone and express it in
    /// UTC. Accepts RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` /
    /// `YYYY-MM-DDTHH:MM:SS` taken as local wall-clock time. During a
    /// fold (DST ending) the earlier instant wins.
    pub fn to_utc(&self, timestamp: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S"))
            .map_err(|_| Error::Parse(format!("unparseable timestamp: {timestamp}")))?;
        self.zone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                Error::Parse(format!("{timestamp} does not exist in {}", self.zone))
            })
    }

    /// Express a UTC timestamp in the user's zone.
    pub fn from_utc(&self, timestamp: &str) -> Result<DateTime<Tz>> {
        let dt = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| Error::Parse(format!("unparseable UTC timestamp: {timestamp}")))?;
        Ok(dt.with_timezone(&self.zone))
    }

    pub fn now_local(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.zone)
    }
}

// ── Capability table ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TimestampParams {
    #[schemars(description = "Timestamp, RFC 3339 or naive YYYY-MM-DD HH:MM:SS")]
    pub timestamp: String,
}

/// Time capabilities for one user's timezone. These never touch the
/// database.
pub fn capabilities(tools: TimeTools) -> Vec<Capability> {
    vec![
        Capability::new(
            "convert_to_utc",
            "Convert a timestamp in the user's local timezone to UTC.",
            move |p: TimestampParams| async move {
                let utc = tools.to_utc(&p.timestamp)?;
                Ok(json!({ "utc": utc.to_rfc3339() }))
            },
        ),
        Capability::new(
            "convert_from_utc",
            "Convert a UTC timestamp to the user's local timezone.",
            move |p: TimestampParams| async move {
                let local = tools.from_utc(&p.timestamp)?;
                Ok(json!({
                    "local": local.to_rfc3339(),
                    "timezone": tools.zone().name(),
                }))
            },
        ),
        Capability::new(
            "get_current_datetime",
            "The current date and time in the user's timezone.",
            move |_: EmptyParams| async move {
                let now = tools.now_local();
                Ok(json!({
                    "local": now.to_rfc3339(),
                    "timezone": tools.zone().name(),
                }))
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_zone_is_a_parse_error() {
        assert!(matches!(TimeTools::new("Mars/Olympus"), Err(Error::Parse(_))));
        assert!(TimeTools::new("Europe/Amsterdam").is_ok());
    }

    #[test]
    fn naive_timestamps_are_read_as_local_time() {
        let tools = TimeTools::new("Europe/Amsterdam").unwrap();
        // CET, +01:00 in winter
        let utc = tools.to_utc("2026-01-15 12:00:00").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-01-15T11:00:00+00:00");
    }

    #[test]
    fn rfc3339_offsets_are_honored_as_is() {
        let tools = TimeTools::new("America/New_York").unwrap();
        let utc = tools.to_utc("2026-06-01T08:00:00+02:00").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-06-01T06:00:00+00:00");
    }

    #[test]
    fn round_trip_preserves_the_instant() {
        let tools = TimeTools::new("Asia/Tokyo").unwrap();
        let utc = tools.to_utc("2026-03-10 09:30:00").unwrap();
        let local = tools.from_utc(&utc.to_rfc3339()).unwrap();
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-03-10 09:30:00");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let tools = TimeTools::new("UTC").unwrap();
        assert!(matches!(tools.to_utc("yesterday-ish"), Err(Error::Parse(_))));
        assert!(matches!(tools.from_utc("not a time"), Err(Error::Parse(_))));
    }
}
