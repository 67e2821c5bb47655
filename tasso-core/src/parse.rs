//! Parser for one daily report file.
//!
//! The first line is a header and is skipped. Only three columns are read:
//! state (0), cumulative confirmed cases (5) and cumulative tests (11).

use std::fmt::Display;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{DayRecord, TassoError};

/// Column holding the state name.
pub const STATE_COLUMN: usize = 0;
/// Column holding cumulative confirmed cases.
pub const CASES_COLUMN: usize = 5;
/// Column holding cumulative tests performed.
pub const TESTS_COLUMN: usize = 11;
/// Rows with fewer columns than this are dropped.
pub const MIN_COLUMNS: usize = TESTS_COLUMN + 1;

/// Outcome of parsing one daily file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDay {
    /// Records that made it through, in file order.
    pub records: Vec<DayRecord>,
    /// Row-level problems. Rows with a malformed number are not in `records`;
    /// rows with zero tests are, without a ratio.
    pub row_errors: Vec<TassoError>,
    /// Data rows seen (header excluded).
    pub rows_read: usize,
    /// Rows dropped silently for being too short or having no state.
    pub rows_skipped: usize,
}

enum Row {
    Kept(DayRecord),
    KeptWithIssue(DayRecord, TassoError),
    Skipped,
    Rejected(TassoError),
}

/// Parse the body of the daily file published for `date`.
///
/// Never fails as a whole: every problem is confined to its row.
#[must_use]
pub fn parse_daily_csv(date: NaiveDate, body: &[u8]) -> ParsedDay {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body);

    let mut out = ParsedDay::default();
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header and lines are 1-based
        let line = idx + 2;
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(TassoError::parse(line, e.to_string()));
                continue;
            }
        };

        match parse_row(date, &record, line) {
            Row::Kept(r) => out.records.push(r),
            Row::KeptWithIssue(r, issue) => {
                out.records.push(r);
                out.row_errors.push(issue);
            }
            Row::Skipped => out.rows_skipped += 1,
            Row::Rejected(e) => out.row_errors.push(e),
        }
    }
    out
}

fn parse_row(date: NaiveDate, record: &StringRecord, line: usize) -> Row {
    if record.len() < MIN_COLUMNS {
        return Row::Skipped;
    }
    let state = &record[STATE_COLUMN];
    if state.is_empty() {
        return Row::Skipped;
    }

    let cases = match optional_field(&record[CASES_COLUMN], line, "cases", str::parse::<i64>) {
        Ok(v) => v,
        Err(e) => return Row::Rejected(e),
    };
    let tests = match optional_field(&record[TESTS_COLUMN], line, "tests", str::parse::<f64>) {
        Ok(Some(t)) if !t.is_finite() => {
            return Row::Rejected(TassoError::parse(line, format!("tests '{t}' is not finite")));
        }
        Ok(v) => v,
        Err(e) => return Row::Rejected(e),
    };

    let rec = DayRecord::new(date, state, cases, tests);
    if cases.is_some() && tests == Some(0.0) {
        let issue = TassoError::parse(line, format!("zero tests for {state}; ratio omitted"));
        return Row::KeptWithIssue(rec, issue);
    }
    Row::Kept(rec)
}

fn optional_field<T, E: Display>(
    raw: &str,
    line: usize,
    column: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<Option<T>, TassoError> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse(raw)
        .map(Some)
        .map_err(|e| TassoError::parse(line, format!("{column} '{raw}': {e}")))
}
