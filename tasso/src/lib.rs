//! Tasso preloads and caches US state COVID cases-per-test ratios.
//!
//! Overview
//! - On start, resolves the newest published daily file by probing backwards
//!   from today, then fetches every day from the earliest date up to it with
//!   bounded concurrency.
//! - Merges all days into one immutable `Snapshot` and publishes it once,
//!   behind an `Arc`, through a `tokio::sync::watch` channel.
//! - Serves the latest ratio per state at any time (directly from the source
//!   while the snapshot is still loading) and full per-state history once the
//!   snapshot exists.
//!
//! Key behaviors
//! - Any failing day inside the resolved range fails the whole pass with a
//!   `PreloadFailure`; readers waiting on the snapshot receive that error.
//! - The newest day is excluded from the preload range unless
//!   `include_latest_day` is set.
//! - Latest ratios use true calendar order, never the `MM-dd-yyyy` spelling.
//!
//! Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use tasso::{PreloadCache, QueryService};
//! use tasso_jhu::JhuSource;
//!
//! let cache = PreloadCache::builder()
//!     .source(Arc::new(JhuSource::new_default()))
//!     .max_concurrent_fetches(20)
//!     .spawn()?;
//! let query = QueryService::new(cache);
//!
//! let latest = query.latest_cases_per_test().await?;
//! let ohio = query.historical_cases_per_test("Ohio").await?;
//! ```
#![warn(missing_docs)]

mod cache;
pub mod preload;
mod query;
mod util;

pub use cache::{CacheStatus, PreloadCache, PreloadCacheBuilder, PreloadState};
pub use query::QueryService;
pub use util::{jitter_wait, with_timeout};

// Re-export core types for convenience
pub use tasso_core::{
    BackoffConfig, DailySource, DateRange, DayRecord, EARLIEST_AVAILABLE_DATE,
    MAX_CONCURRENT_FETCHES, RetryConfig, Snapshot, StateSeries, TassoConfig, TassoError,
    format_date, parse_date,
};
