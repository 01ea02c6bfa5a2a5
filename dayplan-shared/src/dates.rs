/// Calendar date helpers for task scheduling
///
/// Clients submit the task day as a free-form string (`select_date`). The
/// server keeps that raw string and also stores a normalized `DATE` that
/// listing filters on.
///
/// # Accepted formats
///
/// - `2024-01-10` and `2024/01/10`
/// - `10-01-2024` and `10/01/2024` (day first)
/// - RFC 3339 timestamps such as `2024-01-10T09:00:00Z` (the date part is used)

use chrono::{DateTime, NaiveDate, Utc};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Parses a client supplied date string into a calendar date
///
/// Returns `None` when the input matches none of the accepted formats.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use dayplan_shared::dates::parse_date;
///
/// assert_eq!(parse_date("2024-01-10"), NaiveDate::from_ymd_opt(2024, 1, 10));
/// assert_eq!(parse_date("10/01/2024"), NaiveDate::from_ymd_opt(2024, 1, 10));
/// assert_eq!(parse_date("tomorrow"), None);
/// ```
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return Some(date);
        }
    }

    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.date_naive())
}

/// The day tasks are listed for when the client does not pass `date`
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
