//! Latest-date probing and the preload date range.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::TassoError;
use crate::source::DailySource;

/// Half-open range of calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build `[start, end)`. An `end` at or before `start` yields an empty range.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Range covered by a preload pass that resolved `latest` as the newest file.
    ///
    /// The newest day is left out unless `include_latest` is set.
    #[must_use]
    pub fn preload(earliest: NaiveDate, latest: NaiveDate, include_latest: bool) -> Self {
        let end = if include_latest {
            latest.checked_add_days(Days::new(1)).unwrap_or(latest)
        } else {
            latest
        };
        Self::new(earliest, end)
    }

    /// First day of the range.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day after the range.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from((self.end - self.start).num_days()).unwrap_or(0)
    }

    /// Returns true when the range has no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns true if `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Iterate the days of the range in calendar order.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

/// Find the most recent day for which `source` has a daily file.
///
/// Probes `today`, then the days before it, for at most `attempts` dates.
/// `NotFound` moves on to the previous day; any other error is returned as is.
///
/// # Errors
/// Returns `UnavailableRange` when none of the probed dates has a file, and
/// propagates non-`NotFound` errors from the source.
pub async fn latest_available_date(
    source: &dyn DailySource,
    today: NaiveDate,
    attempts: u32,
) -> Result<NaiveDate, TassoError> {
    latest_date_by(today, attempts, |date| source.exists(date)).await
}

/// Same walk as [`latest_available_date`], with each probe supplied by `probe`.
///
/// Callers use this to put a deadline or other policy around every check.
///
/// # Errors
/// Returns `UnavailableRange` when no probe reports a file, and the first
/// error a probe returns.
pub async fn latest_date_by<F, Fut>(
    today: NaiveDate,
    attempts: u32,
    mut probe: F,
) -> Result<NaiveDate, TassoError>
where
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<bool, TassoError>>,
{
    for offset in 0..attempts {
        let Some(candidate) = today.checked_sub_days(Days::new(u64::from(offset))) else {
            break;
        };
        if probe(candidate).await? {
            return Ok(candidate);
        }
    }
    Err(TassoError::UnavailableRange {
        attempts,
        latest_probed: today,
    })
}
