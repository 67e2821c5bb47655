//! tasso-core
//!
//! Core types, traits, and utilities shared across the tasso workspace.
//!
//! - `types`: day records, per-state series, and calendar-date helpers.
//! - `source`: the `DailySource` trait implemented by daily-file connectors.
//! - `parse`: the daily report CSV parser.
//! - `range`: the preload `DateRange` and latest-date probing.
//! - `snapshot`: the immutable `Snapshot` and its `SnapshotBuilder`.
//! - `config`: `TassoConfig` and retry/backoff settings.
//!
//! Dates are always `chrono::NaiveDate`. The `MM-dd-yyyy` spelling used in
//! file names does not sort chronologically, so it is only used at the edges
//! (URLs and JSON keys).
#![warn(missing_docs)]

pub mod config;
mod error;
pub mod parse;
pub mod range;
pub mod snapshot;
/// The daily-source trait.
pub mod source;
pub mod types;

pub use config::{BackoffConfig, MAX_CONCURRENT_FETCHES, RetryConfig, TassoConfig};
pub use error::TassoError;
pub use parse::{ParsedDay, parse_daily_csv};
pub use range::{DateRange, latest_available_date, latest_date_by};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use source::DailySource;
pub use types::{
    DATE_FORMAT, DayRecord, EARLIEST_AVAILABLE_DATE, SeriesByState, StateSeries, format_date,
    parse_date, today_utc,
};
