use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use chrono_english::{parse_date_string, Dialect};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    #[error("Failed to parse date '{input}': {reason}")]
    Date { input: String, reason: String },
    #[error("Invalid time '{0}' (expected HH:MM)")]
    Time(String),
}

/// Parse a start date such as `2025-03-01`, `today` or `next monday`,
/// relative to `now`.
pub fn parse_start_date<Tz: TimeZone>(input: &str, now: DateTime<Tz>) -> Result<NaiveDate, InputError>
where
    Tz::Offset: Copy,
{
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(trimmed, now, Dialect::Uk)
        .map(|dt| dt.date_naive())
        .map_err(|e| InputError::Date {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

pub fn parse_today_relative(input: &str) -> Result<NaiveDate, InputError> {
    parse_start_date(input, Local::now())
}

/// Parse a wall-clock time written as `HH:MM`.
pub fn parse_clock_time(input: &str) -> Result<NaiveTime, InputError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").map_err(|_| InputError::Time(input.to_string()))
}
