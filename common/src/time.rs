//! Calendar date helpers.

use chrono::{DateTime, NaiveDate, Utc};

use crate::ExchangeError;

/// Date format used on the HTTP API, in cache keys and by the provider.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ExchangeError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| ExchangeError::InvalidDate(s.to_string()))
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Current UTC calendar day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Midnight UTC of the given day.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

/// Every calendar day in `[start, end]`. Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}
