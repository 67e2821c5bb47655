use std::collections::BTreeMap;
use std::sync::Arc;

use tasso_core::{DateRange, SnapshotBuilder, StateSeries, TassoError, format_date};

use crate::cache::{CacheStatus, PreloadCache};
use crate::preload;
use crate::util::with_timeout;

/// Read side of the cache.
///
/// `latest_cases_per_test` answers before the snapshot exists by fetching the
/// newest daily file directly. Historical reads wait for the snapshot.
#[derive(Debug, Clone)]
pub struct QueryService {
    cache: Arc<PreloadCache>,
}

impl QueryService {
    /// Wrap a running cache.
    #[must_use]
    pub const fn new(cache: Arc<PreloadCache>) -> Self {
        Self { cache }
    }

    /// The underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<PreloadCache> {
        &self.cache
    }

    /// Preload status summary.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Latest cases-per-test ratio for every state.
    ///
    /// With a published snapshot this is the ratio at each state's
    /// chronologically latest date. Otherwise the latest available day is
    /// resolved and fetched once; the result is returned and not stored.
    /// Never waits on the snapshot.
    ///
    /// # Errors
    /// On the direct path, returns probing errors (`UnavailableRange`, `Fetch`,
    /// `Timeout` for a stalled probe) or the fetch error for the resolved day.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "tasso::query::latest_cases_per_test", skip(self))
    )]
    pub async fn latest_cases_per_test(&self) -> Result<BTreeMap<String, f64>, TassoError> {
        if let Some(snapshot) = self.cache.snapshot() {
            return Ok(snapshot.latest_ratios());
        }

        let cfg = self.cache.config();
        let source = self.cache.source();
        let latest = preload::find_latest(source.as_ref(), cfg).await?;
        #[cfg(feature = "tracing")]
        tracing::info!(date = %format_date(latest), "snapshot not ready; fetching latest day directly");

        let what = format!("daily report {}", format_date(latest));
        let records = with_timeout(cfg.fetch_timeout, &what, source.fetch_day(latest)).await?;
        let mut day = SnapshotBuilder::new(DateRange::preload(latest, latest, true));
        day.merge_day(records);
        Ok(day.build().latest_ratios())
    }

    /// Full ratio series for `state`, once the snapshot is published.
    ///
    /// Returns `None` for a state that never appears with a ratio.
    ///
    /// # Errors
    /// Returns the preload failure if the pass failed, or `Timeout` if the
    /// configured readiness timeout elapses first.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "tasso::query::historical_cases_per_test", skip(self))
    )]
    pub async fn historical_cases_per_test(
        &self,
        state: &str,
    ) -> Result<Option<StateSeries<f64>>, TassoError> {
        let snapshot = self.cache.await_ready().await?;
        Ok(snapshot.ratios(state).cloned())
    }

    /// Full cumulative cases series for `state`, once the snapshot is published.
    ///
    /// # Errors
    /// Same as [`QueryService::historical_cases_per_test`].
    pub async fn historical_cases(
        &self,
        state: &str,
    ) -> Result<Option<StateSeries<i64>>, TassoError> {
        let snapshot = self.cache.await_ready().await?;
        Ok(snapshot.cases(state).cloned())
    }

    /// Full cumulative tests series for `state`, once the snapshot is published.
    ///
    /// # Errors
    /// Same as [`QueryService::historical_cases_per_test`].
    pub async fn historical_tests(
        &self,
        state: &str,
    ) -> Result<Option<StateSeries<i64>>, TassoError> {
        let snapshot = self.cache.await_ready().await?;
        Ok(snapshot.tests(state).cloned())
    }

    /// Every state present in the snapshot, sorted.
    ///
    /// # Errors
    /// Same as [`QueryService::historical_cases_per_test`].
    pub async fn states(&self) -> Result<Vec<String>, TassoError> {
        let snapshot = self.cache.await_ready().await?;
        Ok(snapshot.states().map(str::to_string).collect())
    }
}
