use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tasso_core::{DailySource, RetryConfig, Snapshot, TassoConfig, TassoError, format_date};

use crate::preload;

/// Where the preload pass is.
#[derive(Debug, Clone)]
pub enum PreloadState {
    /// The background pass is still running.
    Loading,
    /// The snapshot is complete and published.
    Ready(Arc<Snapshot>),
    /// The pass ended with a fatal error; nothing will be published.
    Failed(TassoError),
}

impl PreloadState {
    /// Returns true once the snapshot is published.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns true if the pass has ended, successfully or not.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Serializable summary of the preload state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheStatus {
    /// Still loading.
    Loading,
    /// Published.
    Ready {
        /// Daily files merged into the snapshot.
        days_loaded: usize,
        /// Distinct states seen.
        states: usize,
        /// First day of the range, `MM-dd-yyyy`.
        from: String,
        /// First day after the range, `MM-dd-yyyy`.
        until: String,
    },
    /// Failed for good.
    Failed {
        /// Rendered error.
        error: String,
    },
}

impl From<&PreloadState> for CacheStatus {
    fn from(state: &PreloadState) -> Self {
        match state {
            PreloadState::Loading => Self::Loading,
            PreloadState::Ready(s) => Self::Ready {
                days_loaded: s.days_loaded(),
                states: s.states().count(),
                from: format_date(s.range().start()),
                until: format_date(s.range().end()),
            },
            PreloadState::Failed(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Holds the single published `Snapshot` and the background task that builds it.
///
/// Readers see either no snapshot or the complete one. The state moves from
/// `Loading` to `Ready` or `Failed` exactly once, through one `watch` send.
/// Dropping the cache aborts a preload that is still running.
pub struct PreloadCache {
    source: Arc<dyn DailySource>,
    cfg: TassoConfig,
    state: watch::Receiver<PreloadState>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for PreloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadCache")
            .field("source", &self.source.name())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Drop for PreloadCache {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl PreloadCache {
    /// Start building a new `PreloadCache`.
    #[must_use]
    pub fn builder() -> PreloadCacheBuilder {
        PreloadCacheBuilder::new()
    }

    /// Returns true once the snapshot has been published.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    /// Current state, cloned.
    #[must_use]
    pub fn state(&self) -> PreloadState {
        self.state.borrow().clone()
    }

    /// The published snapshot, if any. Never waits.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        match &*self.state.borrow() {
            PreloadState::Ready(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }

    /// Serializable summary of the current state.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        CacheStatus::from(&*self.state.borrow())
    }

    /// The source the cache loads from.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn DailySource> {
        &self.source
    }

    /// Configuration the cache was built with.
    #[must_use]
    pub const fn config(&self) -> &TassoConfig {
        &self.cfg
    }

    /// Wait for the snapshot using the configured `ready_timeout`.
    ///
    /// # Errors
    /// See [`PreloadCache::await_ready_timeout`].
    pub async fn await_ready(&self) -> Result<Arc<Snapshot>, TassoError> {
        self.await_ready_timeout(self.cfg.ready_timeout).await
    }

    /// Wait for the snapshot, for at most `timeout` when given.
    ///
    /// Returns immediately if the pass has already settled.
    ///
    /// # Errors
    /// Returns the preload's own error if it failed, `Timeout` if `timeout`
    /// elapses first, and `Other` if the background task vanished without
    /// publishing.
    pub async fn await_ready_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<Snapshot>, TassoError> {
        let mut rx = self.state.clone();
        let wait = async move {
            let settled = rx
                .wait_for(PreloadState::is_settled)
                .await
                .map_err(|_| TassoError::Other("preload task ended without publishing".into()))?;
            match &*settled {
                PreloadState::Ready(s) => Ok(Arc::clone(s)),
                PreloadState::Failed(e) => Err(e.clone()),
                PreloadState::Loading => Err(TassoError::Other("preload still loading".into())),
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, wait)
                .await
                .unwrap_or_else(|_| Err(TassoError::timeout("preload readiness"))),
            None => wait.await,
        }
    }

    /// Wait until the pass settles and return its failure, if it failed.
    ///
    /// Resolves to `None` on success. Useful for supervising the cache from a
    /// process that should stop when the preload cannot complete.
    pub async fn failure(&self) -> Option<TassoError> {
        self.await_ready_timeout(None).await.err()
    }
}

/// Builder for a `PreloadCache`.
pub struct PreloadCacheBuilder {
    source: Option<Arc<dyn DailySource>>,
    cfg: TassoConfig,
}

impl Default for PreloadCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PreloadCacheBuilder {
    /// Create a builder with `TassoConfig::default()` and no source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            cfg: TassoConfig::default(),
        }
    }

    /// Set the daily source to preload from. Required.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn DailySource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: TassoConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// First day of the preload range.
    #[must_use]
    pub const fn earliest_date(mut self, date: NaiveDate) -> Self {
        self.cfg.earliest_date = date;
        self
    }

    /// Maximum number of days fetched concurrently.
    #[must_use]
    pub const fn max_concurrent_fetches(mut self, n: usize) -> Self {
        self.cfg.max_concurrent_fetches = n;
        self
    }

    /// How many days back to probe for the latest daily file.
    #[must_use]
    pub const fn probe_attempts(mut self, n: u32) -> Self {
        self.cfg.probe_attempts = n;
        self
    }

    /// Include the latest resolved day in the preload range.
    #[must_use]
    pub const fn include_latest_day(mut self, yes: bool) -> Self {
        self.cfg.include_latest_day = yes;
        self
    }

    /// Probe from `date` instead of today's UTC date.
    #[must_use]
    pub const fn as_of(mut self, date: NaiveDate) -> Self {
        self.cfg.as_of = Some(date);
        self
    }

    /// Per-fetch timeout; `None` disables it.
    #[must_use]
    pub const fn fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cfg.fetch_timeout = timeout;
        self
    }

    /// Default bound on readiness waits.
    #[must_use]
    pub const fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.ready_timeout = Some(timeout);
        self
    }

    /// Retry policy for failed days.
    #[must_use]
    pub const fn day_retry(mut self, retry: RetryConfig) -> Self {
        self.cfg.day_retry = retry;
        self
    }

    /// Validate the configuration and start the preload in the background.
    ///
    /// Returns as soon as the task is spawned; the cache starts out `Loading`.
    ///
    /// # Errors
    /// Returns `InvalidArg` if no source was set, the configuration is invalid,
    /// or no tokio runtime is running.
    pub fn spawn(self) -> Result<Arc<PreloadCache>, TassoError> {
        let source = self.source.ok_or_else(|| {
            TassoError::InvalidArg("no source set; add one via source(...)".to_string())
        })?;
        self.cfg.validate()?;
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            TassoError::InvalidArg(format!("PreloadCache must be spawned inside a tokio runtime: {e}"))
        })?;

        let (tx, rx) = watch::channel(PreloadState::Loading);
        let task = {
            let source = Arc::clone(&source);
            let cfg = self.cfg.clone();
            handle.spawn(async move {
                let next = match preload::run_preload(source, &cfg).await {
                    Ok(snapshot) => PreloadState::Ready(Arc::new(snapshot)),
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!(error = %e, "preload failed");
                        PreloadState::Failed(e)
                    }
                };
                tx.send_replace(next);
            })
        };

        Ok(Arc::new(PreloadCache {
            source,
            cfg: self.cfg,
            state: rx,
            task,
        }))
    }
}
