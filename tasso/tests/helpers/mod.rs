#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use tasso::{DateRange, PreloadCache, PreloadCacheBuilder, Snapshot};
use tasso_core::SnapshotBuilder;
use tasso_mock::{DayBehavior, MockGate, MockSource, fixtures};

/// First published day in every fixture.
pub const FIRST: NaiveDate = tasso::EARLIEST_AVAILABLE_DATE;

/// Construct a calendar date for readability in tests.
pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid test date")
}

/// Source publishing synthetic data for every day from `FIRST` through `last`.
pub fn synthetic_source(last: NaiveDate) -> MockSource {
    MockSource::new().with_synthetic_days(FIRST, last)
}

/// Hold back every day of `range` until `gate` opens.
pub fn gate_range(mut src: MockSource, range: DateRange, gate: &MockGate) -> MockSource {
    for date in range.iter() {
        src = src.with_behavior(date, DayBehavior::WaitFor(gate.clone()));
    }
    src
}

/// Cache builder over `src`, probing from `as_of`.
pub fn cache_builder(src: &Arc<MockSource>, as_of: NaiveDate) -> PreloadCacheBuilder {
    PreloadCache::builder().source(src.clone()).as_of(as_of)
}

/// The snapshot a sequential pass over synthetic days of `range` produces.
pub fn expected_snapshot(range: DateRange) -> Snapshot {
    let mut b = SnapshotBuilder::new(range);
    for date in range.iter() {
        b.merge_day(fixtures::synthetic_day(date));
    }
    b.build()
}
