//! The immutable result of a preload pass and the builder that assembles it.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::range::DateRange;
use crate::types::{SeriesByState, StateSeries};
use crate::DayRecord;

/// Complete per-state cases, tests, and ratio series for one preload range.
///
/// Only ever handed out whole, behind an `Arc`, after every day of `range`
/// has been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    range: DateRange,
    days_loaded: usize,
    cases: SeriesByState<i64>,
    tests: SeriesByState<i64>,
    ratios: SeriesByState<f64>,
}

impl Snapshot {
    /// Date range the snapshot was built from.
    #[must_use]
    pub const fn range(&self) -> DateRange {
        self.range
    }

    /// Number of daily files merged.
    #[must_use]
    pub const fn days_loaded(&self) -> usize {
        self.days_loaded
    }

    /// Cases series for `state`, if the state appeared in any file.
    #[must_use]
    pub fn cases(&self, state: &str) -> Option<&StateSeries<i64>> {
        self.cases.get(state)
    }

    /// Tests series for `state`.
    #[must_use]
    pub fn tests(&self, state: &str) -> Option<&StateSeries<i64>> {
        self.tests.get(state)
    }

    /// Cases-per-test series for `state`.
    #[must_use]
    pub fn ratios(&self, state: &str) -> Option<&StateSeries<f64>> {
        self.ratios.get(state)
    }

    /// Every state present in at least one of the three series, sorted.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        let mut all: Vec<&str> = self
            .cases
            .keys()
            .chain(self.tests.keys())
            .chain(self.ratios.keys())
            .map(String::as_str)
            .collect();
        all.sort_unstable();
        all.dedup();
        all.into_iter()
    }

    /// Ratio at the chronologically latest date of each state's ratio series.
    #[must_use]
    pub fn latest_ratios(&self) -> BTreeMap<String, f64> {
        self.ratios
            .iter()
            .filter_map(|(state, series)| {
                series
                    .last_key_value()
                    .map(|(_, ratio)| (state.clone(), *ratio))
            })
            .collect()
    }

    /// Date of the latest ratio for `state`.
    #[must_use]
    pub fn latest_ratio_date(&self, state: &str) -> Option<NaiveDate> {
        self.ratios
            .get(state)
            .and_then(|s| s.last_key_value())
            .map(|(d, _)| *d)
    }
}

/// Accumulates per-day records into the three series.
///
/// Each day contributes keys `(state, day)` no other day shares, so merging
/// days in any order gives the same result.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    range: DateRange,
    days_loaded: usize,
    cases: SeriesByState<i64>,
    tests: SeriesByState<i64>,
    ratios: SeriesByState<f64>,
}

impl SnapshotBuilder {
    /// Start an empty builder for `range`.
    #[must_use]
    pub const fn new(range: DateRange) -> Self {
        Self {
            range,
            days_loaded: 0,
            cases: BTreeMap::new(),
            tests: BTreeMap::new(),
            ratios: BTreeMap::new(),
        }
    }

    /// Merge the records of one daily file.
    ///
    /// Within a file, a later row for the same state overwrites an earlier one
    /// metric by metric.
    pub fn merge_day(&mut self, records: impl IntoIterator<Item = DayRecord>) {
        self.days_loaded += 1;
        for r in records {
            if let Some(c) = r.cases {
                put(&mut self.cases, &r.state, r.date, c);
            }
            if let Some(t) = r.tests {
                put(&mut self.tests, &r.state, r.date, t);
            }
            if let Some(ratio) = r.cases_per_test {
                put(&mut self.ratios, &r.state, r.date, ratio);
            }
        }
    }

    /// Fold another builder covering disjoint days into this one.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.days_loaded += other.days_loaded;
        absorb(&mut self.cases, other.cases);
        absorb(&mut self.tests, other.tests);
        absorb(&mut self.ratios, other.ratios);
        self
    }

    /// Number of days merged so far.
    #[must_use]
    pub const fn days_loaded(&self) -> usize {
        self.days_loaded
    }

    /// Freeze into a `Snapshot`.
    #[must_use]
    pub fn build(self) -> Snapshot {
        Snapshot {
            range: self.range,
            days_loaded: self.days_loaded,
            cases: self.cases,
            tests: self.tests,
            ratios: self.ratios,
        }
    }
}

fn put<V>(series: &mut SeriesByState<V>, state: &str, date: NaiveDate, value: V) {
    if let Some(s) = series.get_mut(state) {
        s.insert(date, value);
    } else {
        series.insert(state.to_string(), BTreeMap::from([(date, value)]));
    }
}

fn absorb<V>(into: &mut SeriesByState<V>, from: SeriesByState<V>) {
    for (state, series) in from {
        into.entry(state).or_default().extend(series);
    }
}
