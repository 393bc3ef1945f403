use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Parse an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone.trim()).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    parse_timezone(timezone).map(|_| ())
}

/// Local wall-clock time in `tz` at the instant `at`.
pub fn local_time(tz: Tz, at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&tz).naive_local()
}

/// The instant the wall clock in `tz` reads `local`.
///
/// Ambiguous times resolve to their first occurrence. Times skipped by a DST
/// jump resolve one hour later, the way the clock reads once it has moved
/// forward.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
}

/// Format a local wall-clock time with its zone abbreviation, e.g.
/// `2025-01-31 23:59 CET`.
pub fn format_local(tz: Tz, local: NaiveDateTime) -> String {
    match resolve_local(tz, local) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M %Z").to_string(),
        None => local.format("%Y-%m-%d %H:%M").to_string(),
    }
}
