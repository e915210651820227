/*!
Miscellaneous utilities for `stockcast`
*/

use chrono::{DateTime, Datelike, Duration, NaiveDate, Weekday};

/// The date format used in every table this crate writes
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Coerce a table index value to a calendar date.
///
/// Accepts a bare `YYYY-MM-DD` date, optionally followed by a time of day and a UTC offset
/// (`2015-07-01 00:00:00-04:00`, `2015-07-01T00:00:00Z`). The calendar date as written is kept:
/// daily bars are stamped in the exchange's local time, so no offset is applied.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.naive_local().date());
    }
    let head = value.get(..10)?;
    let rest = &value[10..];
    if !rest.starts_with(|c: char| c == ' ' || c == 'T') {
        return None;
    }
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

/// The first weekday strictly after `date`
pub fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next = next + Duration::days(1);
    }
    next
}

/// The log level for a `-v` verbosity count
pub fn verbosity_level(verbosity: usize) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Set up logging for a binary. `RUST_LOG`, when set, overrides the verbosity.
pub fn init_logger(verbosity: usize) {
    let level = verbosity_level(verbosity).to_string().to_lowercase();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init();
}
