//! Exponential-backoff retry driver
//!
//! Runs an operation once, then retries it until it succeeds or the retry
//! budget runs out.
//! Each attempt is a fresh invocation of the operation; nothing carries
//! over from a failed attempt.

use std::future::Future;
use std::time::Duration;

/// Growth factor of the batch retry delay
pub const SEND_BATCH_BACKOFF_FACTOR: u32 = 2;

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means a single attempt
    pub max_retries: u32,
    /// Delay after the first failure
    pub retry_interval: Duration,
    /// Delay multiplier per failure
    pub backoff_factor: u32,
    /// Delay cap
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Create policy
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, retry_interval: Duration, backoff_factor: u32, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            retry_interval,
            backoff_factor,
            max_backoff,
        }
    }

    /// Delay that follows `current`
    #[inline]
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.backoff_factor).min(self.max_backoff)
    }

    /// Attempts made before giving up
    #[inline]
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delays slept between attempts, in order
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut delay = self.retry_interval.min(self.max_backoff);
        for _ in 0..self.max_retries {
            delays.push(delay);
            delay = self.next_delay(delay);
        }
        delays
    }
}

/// All attempts failed
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    /// Name of the retried operation
    pub operation: String,
    /// Attempts made
    pub attempts: u32,
    /// Error from the final attempt
    #[source]
    pub last_error: E,
}

/// Run `operation`, retrying up to `policy.max_retries` times on failure.
///
/// The operation receives the 1-based attempt number.
///
/// # Errors
/// Returns [`RetryExhausted`] wrapping the final attempt's error.
pub async fn execute<T, E, F, Fut>(
    name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let max_attempts = policy.total_attempts();
    let mut delay = policy.retry_interval.min(policy.max_backoff);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    operation: name.to_string(),
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                tracing::debug!(
                    operation = name,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = policy.next_delay(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(100),
            SEND_BATCH_BACKOFF_FACTOR,
            Duration::from_millis(300),
        )
    }

    fn failure() -> BatchError {
        BatchError::ChannelClosed { pending: 1 }
    }

    #[test]
    fn delays_grow_then_cap() {
        let delays = policy(4).delays();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(300),
            ]
        );
    }

    #[test]
    fn no_retries_has_no_delays() {
        assert!(policy(0).delays().is_empty());
        assert_eq!(policy(0).total_attempts(), 1);
        assert_eq!(policy(1).delays(), vec![Duration::from_millis(100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryExhausted<BatchError>> = execute("op", &policy(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(attempt) }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let result = execute("op", &policy(3), |attempt| async move {
            if attempt < 3 {
                Err(failure())
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_runs_once_plus_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let result: Result<(), _> = execute("send_batch", &policy(4), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            stamps.lock().push(Instant::now());
            async { Err(failure()) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(err.operation, "send_batch");
        assert_eq!(err.last_error, failure());
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let stamps = stamps.lock();
        let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        let expected = policy(4).delays();
        assert_eq!(gaps.len(), expected.len());
        for (gap, delay) in gaps.iter().zip(&expected) {
            assert!(*gap >= *delay && *gap < *delay + Duration::from_millis(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_tries_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute("op", &policy(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(failure()) }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhausted_error_display() {
        let err = RetryExhausted {
            operation: "send_batch".to_string(),
            attempts: 3,
            last_error: failure(),
        };
        let message = err.to_string();
        assert!(message.contains("send_batch failed after 3 attempt(s)"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
