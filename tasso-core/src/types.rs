//! Day records, per-state series, and calendar-date helpers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::TassoError;

/// Date format used by the remote daily file names and by the HTTP boundary.
pub const DATE_FORMAT: &str = "%m-%d-%Y";

/// First day for which the remote source publishes a US daily report.
pub const EARLIEST_AVAILABLE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2020, 4, 12) {
    Some(d) => d,
    None => panic!("invalid earliest available date"),
};

/// Values for one state and one metric, keyed by calendar date.
///
/// `BTreeMap` keeps keys in chronological order, so the last entry is the latest day.
pub type StateSeries<V> = BTreeMap<NaiveDate, V>;

/// One `StateSeries` per state.
pub type SeriesByState<V> = BTreeMap<String, StateSeries<V>>;

/// Render a date the way daily file names spell it (`MM-dd-yyyy`).
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `MM-dd-yyyy` date string.
///
/// # Errors
/// Returns `InvalidArg` if the string is not a valid date in that format.
pub fn parse_date(s: &str) -> Result<NaiveDate, TassoError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| TassoError::InvalidArg(format!("invalid date '{s}': {e}")))
}

/// Current calendar date in UTC.
#[must_use]
pub fn today_utc() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// One state's row from one daily file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    /// Day the file was published for.
    pub date: NaiveDate,
    /// State name as spelled in the file.
    pub state: String,
    /// Cumulative confirmed cases, if reported.
    pub cases: Option<i64>,
    /// Cumulative tests performed (truncated to an integer), if reported.
    pub tests: Option<i64>,
    /// `cases / tests`, present only when both are reported and tests is non-zero.
    pub cases_per_test: Option<f64>,
}

impl DayRecord {
    /// Build a record from parsed metrics.
    ///
    /// `tests` is the value as reported; it is truncated for the `tests` field
    /// while the ratio divides by the untruncated value. A zero or non-finite
    /// denominator leaves the ratio absent.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn new(
        date: NaiveDate,
        state: impl Into<String>,
        cases: Option<i64>,
        tests: Option<f64>,
    ) -> Self {
        let cases_per_test = match (cases, tests) {
            (Some(c), Some(t)) if t != 0.0 => Some(c as f64 / t).filter(|r| r.is_finite()),
            _ => None,
        };
        Self {
            date,
            state: state.into(),
            cases,
            tests: tests.map(|t| t.trunc() as i64),
            cases_per_test,
        }
    }
}
