pub mod decisions;
pub mod people;
pub mod projects;
pub mod types;
pub mod users;

use chrono::{NaiveDate, Utc};

use crate::error::Error;

/// Current instant as RFC 3339 UTC text, the storage format for all timestamps.
pub fn now_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a `YYYY-MM-DD` calendar date. Malformed input is a [`Error::Parse`],
/// never a silent default.
pub fn parse_calendar_date(s: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::Parse(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

/// Turn a `YYYY-MM-DD` date into the stored RFC 3339 form (midnight UTC).
pub(crate) fn date_to_timestamp(s: &str) -> Result<String, Error> {
    let date = parse_calendar_date(s)?;
    let dt = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    Ok(dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_date() {
        let d = parse_calendar_date("2026-03-14").unwrap();
        assert_eq!(d.to_string(), "2026-03-14");
    }

    #[test]
    fn malformed_date_is_parse_error() {
        for bad in ["14-03-2026", "2026/03/14", "yesterday", ""] {
            assert!(matches!(parse_calendar_date(bad), Err(Error::Parse(_))));
        }
    }

    #[test]
    fn date_to_timestamp_is_midnight_utc() {
        let ts = date_to_timestamp("2026-03-14").unwrap();
        assert!(ts.starts_with("2026-03-14T00:00:00"));
    }
}
