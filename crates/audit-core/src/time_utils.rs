use std::sync::OnceLock;

use chrono::{DateTime, Local, NaiveDate, Utc};
use regex::Regex;

use crate::error::{AuditError, Result};

/// Report dates are always written as `YYYY-MM-DD`.
pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` report date.
///
/// ```
/// use audit_core::time_utils::parse_report_date;
///
/// assert!(parse_report_date("2026-01-28").is_ok());
/// assert!(parse_report_date("2026-02-30").is_err());
/// ```
pub fn parse_report_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), REPORT_DATE_FORMAT)
        .map_err(|_| AuditError::InvalidDate(s.to_string()))
}

/// Render a report date the way it is stored.
pub fn format_report_date(date: NaiveDate) -> String {
    date.format(REPORT_DATE_FORMAT).to_string()
}

/// First valid `YYYY-MM-DD` embedded in a file or folder name.
pub fn date_in_name(name: &str) -> Option<NaiveDate> {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = DATE_RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("regex is valid"));
    re.find_iter(name)
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), REPORT_DATE_FORMAT).ok())
}

/// Local wall-clock rendering of a run timestamp for terminal output.
pub fn format_display_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
