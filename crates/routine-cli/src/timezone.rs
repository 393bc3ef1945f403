use chrono_tz::Tz;
use routine_core::error::CoreError;
use routine_core::timezone::{parse_timezone, validate_timezone};

/// Detect the timezone the backup clock should run in
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if !tz.is_empty() && validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    "UTC".to_string()
}

/// Timezones offered as suggestions when input does not parse
pub fn get_common_timezones() -> Vec<&'static str> {
    vec![
        "UTC",
        "America/New_York",
        "America/Chicago",
        "America/Denver",
        "America/Los_Angeles",
        "Europe/London",
        "Europe/Paris",
        "Europe/Berlin",
        "Europe/Istanbul",
        "Africa/Nairobi",
        "Africa/Lagos",
        "Asia/Dubai",
        "Asia/Kolkata",
        "Asia/Shanghai",
        "Asia/Tokyo",
        "Australia/Sydney",
        "Pacific/Auckland",
    ]
}

pub fn suggest_timezone(invalid: &str) -> Vec<&'static str> {
    let invalid_lower = invalid.to_lowercase();
    let mut matches: Vec<_> = get_common_timezones()
        .into_iter()
        .filter(|tz| {
            tz.split('/')
                .any(|part| part.to_lowercase().contains(&invalid_lower))
                || invalid_lower.contains(&tz.to_lowercase())
        })
        .collect();
    matches.truncate(5);
    matches
}

/// Resolve user input to an IANA timezone, accepting a few common
/// abbreviations
pub fn normalize_timezone_input(input: &str) -> Result<Tz, CoreError> {
    if let Ok(tz) = parse_timezone(input) {
        return Ok(tz);
    }

    let mapped = match input.trim().to_lowercase().as_str() {
        "est" | "eastern" => "America/New_York",
        "cst" | "central" => "America/Chicago",
        "mst" | "mountain" => "America/Denver",
        "pst" | "pacific" => "America/Los_Angeles",
        "gmt" | "utc" => "UTC",
        "eat" | "nairobi" => "Africa/Nairobi",
        "trt" | "istanbul" => "Europe/Istanbul",
        _ => {
            let suggestions = suggest_timezone(input);
            return Err(CoreError::InvalidTimezone(if suggestions.is_empty() {
                format!("{} (use IANA names like 'America/New_York')", input)
            } else {
                format!("{} (did you mean: {}?)", input, suggestions.join(", "))
            }));
        }
    };

    parse_timezone(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Europe/Istanbul", "Europe/Istanbul")]
    #[case("eastern", "America/New_York")]
    #[case("utc", "UTC")]
    #[case("nairobi", "Africa/Nairobi")]
    fn test_normalize_timezone_input(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_timezone_input(input).unwrap().name(), expected);
    }

    #[test]
    fn test_unknown_timezone_suggests_city() {
        let error = normalize_timezone_input("Tokyo Time").unwrap_err();
        assert!(error.to_string().contains("Invalid timezone"));

        let error = normalize_timezone_input("berlin").unwrap_err();
        assert!(error.to_string().contains("Europe/Berlin"));
    }

    #[test]
    fn test_detected_timezone_is_valid() {
        assert!(validate_timezone(&detect_system_timezone()).is_ok());
    }
}
