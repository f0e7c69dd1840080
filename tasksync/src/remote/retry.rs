//! Bounded fixed-delay retry for remote calls.

use std::future::Future;

use super::{RemoteError, RetryConfig};

/// Run `call` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` attempts have been made.
///
/// Waits `config.delay` between attempts. `operation` only labels log lines.
///
/// # Errors
///
/// Returns the last [`RemoteError`] once attempts are exhausted, or the first
/// non-retryable one.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::debug!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "remote call failed, will retry"
                );
                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::debug!(operation, attempt, error = %e, "remote call failed");
                return Err(e);
            }
        }
    }
}
