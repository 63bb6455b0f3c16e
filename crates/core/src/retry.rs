//! Bounded retry with exponential backoff for transient storage failures.

use std::future::Future;
use std::time::Duration;

use crate::error::ChronicleResult;

/// Maximum backoff delay between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Compute the backoff delay for a retry attempt (1-based).
///
/// Follows 100ms * 2^(attempt-1), capped at [`MAX_BACKOFF`].
pub fn backoff_delay(attempt: u32) -> Duration {
    let millis = 100u64.saturating_mul(1u64 << (attempt - 1).min(16));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

/// Run `op` up to `max_attempts` times, sleeping with exponential backoff
/// between attempts.
///
/// Only errors reporting [`crate::error::ChronicleError::is_retryable`] are retried;
/// everything else (validation, tenant mismatch, token rejections) is
/// returned immediately.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, mut op: F) -> ChronicleResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChronicleResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient storage error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChronicleError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_is_exponential_and_capped() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(400));
        assert_eq!(backoff_delay(12), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retries(5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ChronicleError::StorageUnavailable("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: ChronicleResult<i32> = with_retries(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ChronicleError::TenantMismatch("nope".into())) }
        })
        .await;
        assert!(matches!(result, Err(ChronicleError::TenantMismatch(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: ChronicleResult<i32> = with_retries(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ChronicleError::StorageUnavailable("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(ChronicleError::StorageUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
