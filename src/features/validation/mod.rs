//! # Input Validation Feature
//!
//! Pure checks for free-text input before it is accepted into a record.
//! Malformed input is an expected outcome here, so every check returns
//! `Validation<T>` carrying a human readable reason instead of an error.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use chrono::{Datelike, Local, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Longest room label accepted
pub const MAX_ROOM_LEN: usize = 20;

/// Rejection reason for a piece of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid(String);

impl Invalid {
    pub fn new(reason: impl Into<String>) -> Self {
        Invalid(reason.into())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Invalid {}

pub type Validation<T> = Result<T, Invalid>;

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").expect("time pattern compiles")
    })
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{2}|\d{4})$").expect("date pattern compiles")
    })
}

/// Validate a `HH:MM` time of day (24h clock)
pub fn validate_time(input: &str) -> Validation<NaiveTime> {
    if input.is_empty() {
        return Err(Invalid::new("Time cannot be empty"));
    }

    let caps = time_pattern().captures(input).ok_or_else(|| {
        Invalid::new("Invalid time format. Use HH:MM (for example 09:30)")
    })?;

    let hour: u32 = caps[1].parse().map_err(|_| Invalid::new("Invalid hour"))?;
    let minute: u32 = caps[2].parse().map_err(|_| Invalid::new("Invalid minute"))?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| Invalid::new("Invalid time"))
}

/// Parse `DD.MM.YY` or `DD.MM.YYYY` into a calendar date.
///
/// Two-digit years below 50 land in 2000+, the rest in 1900+.
pub fn parse_date(input: &str) -> Validation<NaiveDate> {
    if input.is_empty() {
        return Err(Invalid::new("Date cannot be empty"));
    }

    let caps = date_pattern().captures(input).ok_or_else(|| {
        Invalid::new("Invalid date format. Use DD.MM.YY or DD.MM.YYYY (for example 25.12.24)")
    })?;

    let day: u32 = caps[1].parse().map_err(|_| Invalid::new("Invalid day"))?;
    let month: u32 = caps[2].parse().map_err(|_| Invalid::new("Invalid month"))?;
    let mut year: i32 = caps[3].parse().map_err(|_| Invalid::new("Invalid year"))?;

    if caps[3].len() == 2 {
        year += if year < 50 { 2000 } else { 1900 };
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Invalid::new("Invalid date. Check the day and month"))
}

/// Validate a deadline date relative to `today`: well formed and not in the past
pub fn validate_date_on(input: &str, today: NaiveDate) -> Validation<NaiveDate> {
    let date = parse_date(input)?;
    if date < today {
        return Err(Invalid::new("Date cannot be in the past"));
    }
    Ok(date)
}

/// Validate a deadline date against the local calendar
pub fn validate_date(input: &str) -> Validation<NaiveDate> {
    validate_date_on(input, Local::now().date_naive())
}

/// Validate free text by character count
pub fn validate_text(input: &str, min_len: usize, max_len: usize) -> Validation<String> {
    if input.is_empty() {
        return Err(Invalid::new("Text cannot be empty"));
    }

    let len = input.chars().count();
    if len < min_len {
        return Err(Invalid::new(format!(
            "Text must be at least {min_len} characters"
        )));
    }
    if len > max_len {
        return Err(Invalid::new(format!(
            "Text must not exceed {max_len} characters"
        )));
    }

    Ok(input.to_string())
}

/// Validate an optional room label. Empty means "no room".
pub fn validate_room(input: &str) -> Validation<Option<String>> {
    if input.is_empty() {
        return Ok(None);
    }
    if input.chars().count() > MAX_ROOM_LEN {
        return Err(Invalid::new(format!(
            "Room must not exceed {MAX_ROOM_LEN} characters"
        )));
    }
    Ok(Some(input.to_string()))
}

/// Parse a weekday given as 0-6 (Monday = 0) or an English day name
pub fn parse_weekday(input: &str) -> Validation<Weekday> {
    let trimmed = input.trim();
    if let Ok(index) = trimmed.parse::<u8>() {
        return weekday_from_index(index)
            .ok_or_else(|| Invalid::new("Day number must be between 0 (Monday) and 6 (Sunday)"));
    }
    trimmed
        .parse::<Weekday>()
        .map_err(|_| Invalid::new("Unknown day. Use a day name like Monday or a number 0-6"))
}

/// Monday = 0 ... Sunday = 6
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Inverse of [`weekday_from_index`]
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_monday() as u8
}

/// Weekday of a date, Monday = 0
pub fn date_weekday_index(date: NaiveDate) -> u8 {
    weekday_index(date.weekday())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_time_accepts_full_range() {
        for hour in 0..24 {
            for minute in 0..60 {
                let input = format!("{hour:02}:{minute:02}");
                let parsed = validate_time(&input).unwrap();
                assert_eq!(parsed, NaiveTime::from_hms_opt(hour, minute, 0).unwrap());
            }
        }
    }

    #[test]
    fn test_time_rejects_malformed() {
        for input in ["", "24:00", "12:60", "12-30", "1230", "12:3", "ab:cd", " 12:30", "12:30 ", "123:00"] {
            let result = validate_time(input);
            assert!(result.is_err(), "expected {input:?} to be rejected");
            assert!(!result.unwrap_err().reason().is_empty());
        }
    }

    #[test]
    fn test_time_single_digit_hour() {
        assert_eq!(
            validate_time("9:05").unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_leap_day() {
        let today = day(2024, 1, 1);
        assert_eq!(validate_date_on("29.02.24", today).unwrap(), day(2024, 2, 29));
        assert!(validate_date_on("29.02.23", day(2023, 1, 1)).is_err());
    }

    #[test]
    fn test_past_dates_rejected() {
        let today = day(2026, 10, 16);
        let err = validate_date_on("15.10.2026", today).unwrap_err();
        assert_eq!(err.reason(), "Date cannot be in the past");
        assert!(validate_date_on("16.10.26", today).is_ok());
        assert!(validate_date_on("01.01.2027", today).is_ok());
    }

    #[test]
    fn test_two_digit_year_mapping() {
        assert_eq!(parse_date("01.01.49").unwrap().year(), 2049);
        assert_eq!(parse_date("01.01.50").unwrap().year(), 1950);
        assert_eq!(parse_date("01.01.2050").unwrap().year(), 2050);
    }

    #[test]
    fn test_date_format_errors() {
        for input in ["", "2024-01-01", "1.1.1", "01.01.202", "32.01.2030", "01.13.2030"] {
            assert!(parse_date(input).is_err(), "expected {input:?} to be rejected");
        }
        assert_eq!(parse_date("5.3.2030").unwrap(), day(2030, 3, 5));
    }

    #[test]
    fn test_text_bounds() {
        assert!(validate_text("", 1, 10).is_err());
        assert!(validate_text("ab", 3, 10).is_err());
        assert!(validate_text("abcdefghijk", 1, 10).is_err());
        assert_eq!(validate_text("Math", 1, 100).unwrap(), "Math");
        // counted in characters, not bytes
        assert!(validate_text("математика", 1, 10).is_ok());
    }

    #[test]
    fn test_room_optional() {
        assert_eq!(validate_room("").unwrap(), None);
        assert_eq!(validate_room("B-204").unwrap(), Some("B-204".to_string()));
        assert!(validate_room(&"x".repeat(MAX_ROOM_LEN)).is_ok());
        assert!(validate_room(&"x".repeat(MAX_ROOM_LEN + 1)).is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("0").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("6").unwrap(), Weekday::Sun);
        assert_eq!(parse_weekday("friday").unwrap(), Weekday::Fri);
        assert!(parse_weekday("7").is_err());
        assert!(parse_weekday("someday").is_err());
        assert_eq!(weekday_index(Weekday::Wed), 2);
    }
}
