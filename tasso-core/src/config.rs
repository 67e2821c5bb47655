//! Configuration for the preload pipeline and the query layer.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::TassoError;
use crate::types::EARLIEST_AVAILABLE_DATE;

/// Upper bound accepted for `TassoConfig::max_concurrent_fetches`.
pub const MAX_CONCURRENT_FETCHES: usize = 1024;

/// Exponential backoff configuration for retrying a failed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Per-day retry policy applied by the preload pipeline.
///
/// `NotFound` is never retried: inside an already-resolved range it means the
/// source changed underneath us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per day, including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Global configuration for the preload cache and query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TassoConfig {
    /// First day of the preload range.
    pub earliest_date: NaiveDate,
    /// Maximum number of daily files fetched concurrently during preload.
    pub max_concurrent_fetches: usize,
    /// How many days back from `as_of` to probe for the latest daily file.
    pub probe_attempts: u32,
    /// Include the resolved latest day in the preload range.
    ///
    /// Off by default: the range is `[earliest_date, latest)`.
    pub include_latest_day: bool,
    /// Pin the probing start date instead of using the current UTC date.
    pub as_of: Option<NaiveDate>,
    /// Timeout applied to each individual daily fetch.
    pub fetch_timeout: Option<Duration>,
    /// Default bound on how long readers wait for the snapshot to be published.
    pub ready_timeout: Option<Duration>,
    /// Retry policy for failed days during preload.
    pub day_retry: RetryConfig,
}

impl Default for TassoConfig {
    fn default() -> Self {
        Self {
            earliest_date: EARLIEST_AVAILABLE_DATE,
            max_concurrent_fetches: 20,
            probe_attempts: 3,
            include_latest_day: false,
            as_of: None,
            fetch_timeout: Some(Duration::from_secs(60)),
            ready_timeout: None,
            day_retry: RetryConfig::default(),
        }
    }
}

impl TassoConfig {
    /// Check the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the fetch pool, probe budget, or retry budget is zero,
    /// when the fetch pool exceeds [`MAX_CONCURRENT_FETCHES`], or when the
    /// backoff factor is zero.
    pub fn validate(&self) -> Result<(), TassoError> {
        if self.max_concurrent_fetches == 0 {
            return Err(TassoError::InvalidArg(
                "max_concurrent_fetches must be at least 1".into(),
            ));
        }
        if self.max_concurrent_fetches > MAX_CONCURRENT_FETCHES {
            return Err(TassoError::InvalidArg(format!(
                "max_concurrent_fetches must be at most {MAX_CONCURRENT_FETCHES}, got {}",
                self.max_concurrent_fetches
            )));
        }
        if self.probe_attempts == 0 {
            return Err(TassoError::InvalidArg(
                "probe_attempts must be at least 1".into(),
            ));
        }
        if self.day_retry.max_attempts == 0 {
            return Err(TassoError::InvalidArg(
                "day_retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.day_retry.backoff.factor == 0 {
            return Err(TassoError::InvalidArg(
                "day_retry.backoff.factor must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
