//! The preload pass: resolve the range, fetch every day under a bounded
//! pool, and merge the results into one `Snapshot`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use tasso_core::{
    DailySource, DateRange, DayRecord, MAX_CONCURRENT_FETCHES, RetryConfig, Snapshot,
    SnapshotBuilder, TassoConfig, TassoError, format_date, latest_date_by, today_utc,
};

use crate::util::{jitter_wait, with_timeout};

/// Resolve the preload range from the latest available day.
///
/// # Errors
/// Returns `UnavailableRange` when no recent daily file exists, or the first
/// non-`NotFound` error seen while probing.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "tasso::preload::resolve_range", skip(source, cfg))
)]
pub async fn resolve_range(
    source: &dyn DailySource,
    cfg: &TassoConfig,
) -> Result<DateRange, TassoError> {
    let latest = find_latest(source, cfg).await?;
    let range = DateRange::preload(cfg.earliest_date, latest, cfg.include_latest_day);
    #[cfg(feature = "tracing")]
    tracing::info!(
        latest = %format_date(latest),
        from = %format_date(range.start()),
        until = %format_date(range.end()),
        days = range.len(),
        "resolved preload range"
    );
    Ok(range)
}

/// Probe backwards from `cfg.as_of` (or today) for the newest daily file.
///
/// Each check is bounded by `cfg.fetch_timeout`; a stalled probe fails with
/// `Timeout` instead of holding up the caller.
pub(crate) async fn find_latest(
    source: &dyn DailySource,
    cfg: &TassoConfig,
) -> Result<NaiveDate, TassoError> {
    let today = cfg.as_of.unwrap_or_else(today_utc);
    let fetch_timeout = cfg.fetch_timeout;
    latest_date_by(today, cfg.probe_attempts, move |date| async move {
        let what = format!("probe for daily report {}", format_date(date));
        with_timeout(fetch_timeout, &what, source.exists(date)).await
    })
    .await
}

/// Run a full preload pass against `source`.
///
/// # Errors
/// Returns the range-resolution error, or a `PreloadFailure` naming the first
/// day that could not be loaded.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "tasso::preload::run", skip(source, cfg), fields(source = source.name()))
)]
pub async fn run_preload(
    source: Arc<dyn DailySource>,
    cfg: &TassoConfig,
) -> Result<Snapshot, TassoError> {
    let range = resolve_range(source.as_ref(), cfg).await?;
    preload_range(source, range, cfg).await
}

/// Fetch and merge every day of `range`.
///
/// At most `cfg.max_concurrent_fetches` days are in flight at once. Results
/// are merged as tasks finish, in whatever order that is. The first failing
/// day ends the pass and the remaining tasks are aborted.
///
/// # Errors
/// Returns `PreloadFailure` for the first day whose fetch failed after retries.
pub async fn preload_range(
    source: Arc<dyn DailySource>,
    range: DateRange,
    cfg: &TassoConfig,
) -> Result<Snapshot, TassoError> {
    let permits = Arc::new(Semaphore::new(
        cfg.max_concurrent_fetches.clamp(1, MAX_CONCURRENT_FETCHES),
    ));
    let mut tasks = JoinSet::new();
    let mut days = HashMap::with_capacity(range.len());

    for date in range.iter() {
        let source = Arc::clone(&source);
        let permits = Arc::clone(&permits);
        let fetch_timeout = cfg.fetch_timeout;
        let retry = cfg.day_retry;
        let handle = tasks.spawn(async move {
            let _permit = permits
                .acquire()
                .await
                .map_err(|_| TassoError::Other("fetch pool closed".into()))?;
            fetch_day_with_retry(source.as_ref(), date, fetch_timeout, &retry)
                .await
                .map(|records| (date, records))
                .map_err(|e| TassoError::preload_failure(date, &e))
        });
        days.insert(handle.id(), date);
    }

    let mut builder = SnapshotBuilder::new(range);
    while let Some(joined) = tasks.join_next_with_id().await {
        // Returning early drops `tasks`, which aborts every unfinished day.
        let (_date, records) = match joined {
            Ok((_, day)) => day?,
            Err(e) => {
                let err = TassoError::Other(format!("day task did not complete: {e}"));
                return Err(match days.get(&e.id()) {
                    Some(&date) => TassoError::preload_failure(date, &err),
                    None => err,
                });
            }
        };
        builder.merge_day(records);
        #[cfg(feature = "tracing")]
        tracing::trace!(date = %format_date(_date), merged = builder.days_loaded(), "day merged");
    }

    let snapshot = builder.build();
    #[cfg(feature = "tracing")]
    tracing::info!(
        days = snapshot.days_loaded(),
        states = snapshot.states().count(),
        "preload complete"
    );
    Ok(snapshot)
}

/// Fetch one day, retrying per `retry` with exponential backoff and jitter.
///
/// `NotFound` is returned immediately; a missing file inside a resolved range
/// will not appear by asking again.
pub(crate) async fn fetch_day_with_retry(
    source: &dyn DailySource,
    date: NaiveDate,
    fetch_timeout: Option<Duration>,
    retry: &RetryConfig,
) -> Result<Vec<DayRecord>, TassoError> {
    let what = format!("daily report {}", format_date(date));
    let mut attempt = 1;
    let mut delay_ms = retry.backoff.min_backoff_ms;
    loop {
        match with_timeout(fetch_timeout, &what, source.fetch_day(date)).await {
            Ok(records) => return Ok(records),
            Err(e) if e.is_not_found() || attempt >= retry.max_attempts => return Err(e),
            Err(_err) => {
                let wait = jitter_wait(delay_ms, u32::from(retry.backoff.jitter_percent));
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    date = %format_date(date),
                    attempt,
                    wait_ms = wait,
                    error = %_err,
                    "daily fetch failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(wait)).await;
                delay_ms = delay_ms
                    .saturating_mul(u64::from(retry.backoff.factor))
                    .min(retry.backoff.max_backoff_ms);
                attempt += 1;
            }
        }
    }
}
