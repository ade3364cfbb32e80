//! Retry helper for flaky async operations

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Run `op` up to `max_tries` times, returning the first success
///
/// The final attempt's error propagates untouched; earlier failures are
/// logged and retried. `max_tries` of 0 or 1 both mean a single attempt.
pub async fn with_retry<T, E, F, Fut>(max_tries: usize, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut tries_remaining = max_tries;
    while tries_remaining > 1 {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tries_remaining -= 1;
                warn!(error = %err, %tries_remaining, "with_retry: attempt failed, retrying");
            }
        }
    }
    op().await
}
