use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{DayRecord, TassoError};

/// A publisher of one data file per calendar day.
///
/// Implementations fetch and parse a single day; they do not retry. Missing
/// files must be reported as `TassoError::NotFound` so date probing can tell
/// them apart from transport failures.
#[async_trait]
pub trait DailySource: Send + Sync {
    /// Stable identifier used in logs and error tags.
    fn name(&self) -> &'static str;

    /// Fetch and parse the daily file for `date`.
    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<DayRecord>, TassoError>;

    /// Check whether a daily file exists for `date`.
    ///
    /// The default fetches the whole day and maps `NotFound` to `false`;
    /// sources with a cheaper check should override it.
    async fn exists(&self, date: NaiveDate) -> Result<bool, TassoError> {
        match self.fetch_day(date).await {
            Ok(_) => Ok(true),
            Err(TassoError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
