//! Date and timestamp conversions for storage and display.
//!
//! The store persists calendar dates as `YYYY-MM-DD` text and instants as
//! INTEGER milliseconds since the Unix epoch (UTC). This module is the single
//! place where those representations are produced and parsed.
//!
//! ## Format Specifications
//!
//! - **Dates**: `2024-03-01`, always zero-padded, no time zone
//! - **Timestamps**: `1709251200000` for `2024-03-01T00:00:00Z`
//! - **Day ranges**: an inclusive `[start, end]` date range covers
//!   `[start 00:00 UTC, end + 1 day 00:00 UTC)` in epoch milliseconds
//!
//! ## Examples
//!
//! ```rust
//! use chrono::NaiveDate;
//! use memodiary::libs::formatter::{day_range_millis, format_date, parse_date};
//!
//! let date = parse_date("2024-03-01").unwrap();
//! assert_eq!(format_date(date), "2024-03-01");
//!
//! let (start, end) = day_range_millis(date, date);
//! assert_eq!(end - start, 86_400_000);
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rusqlite::types::{FromSqlError, Type};

/// Storage and display format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
}

pub fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Instant for `millis`; out-of-range values clamp to the epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Half-open epoch-millisecond bounds covering the inclusive date range.
///
/// The upper bound is open (`i64::MAX`) when `end` is the last representable date.
pub fn day_range_millis(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let lower = to_millis(start.and_time(NaiveTime::MIN).and_utc());
    let upper = end
        .succ_opt()
        .map(|next| to_millis(next.and_time(NaiveTime::MIN).and_utc()))
        .unwrap_or(i64::MAX);
    (lower, upper)
}

/// Inclusive sequence of days; empty when `start > end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Reads a `YYYY-MM-DD` column, reporting bad text as a conversion failure.
pub(crate) fn date_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(index)?;
    parse_date(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

pub(crate) fn optional_date_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(index)?;
    text.map(|text| parse_date(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))))
        .transpose()
}

pub(crate) fn millis_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(index)?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(FromSqlError::OutOfRange(millis))))
}
