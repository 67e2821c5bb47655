use std::time::Duration;

use rand::Rng;
use tasso_core::TassoError;

/// Bound `fut` by an optional timeout, mapping expiry to `TassoError::Timeout`.
///
/// With `None` the future runs to completion.
pub async fn with_timeout<T, Fut>(
    timeout: Option<Duration>,
    what: &str,
    fut: Fut,
) -> Result<T, TassoError>
where
    Fut: core::future::Future<Output = Result<T, TassoError>>,
{
    match timeout {
        Some(t) => tokio::time::timeout(t, fut)
            .await
            .unwrap_or_else(|_| Err(TassoError::timeout(what))),
        None => fut.await,
    }
}

/// `base_ms` plus a random jitter of up to `jitter_percent` percent of it.
#[must_use]
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}
