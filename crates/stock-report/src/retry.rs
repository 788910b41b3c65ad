//! Retry logic with exponential backoff and per-attempt timeouts
//!
//! Every call to an upstream provider goes through [`RetryPolicy::execute`],
//! so backoff and timeout behaviour is uniform across data categories.

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }

    /// Backoff to wait before the given attempt (attempt 0 never waits)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Execute an async operation, bounding every attempt by `attempt_timeout`
    ///
    /// Non-retryable errors are returned on first sight. A timed-out attempt
    /// counts as a [`StockError::Timeout`] and is retried like any other fetch
    /// failure.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        attempt_timeout: Duration,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            debug!(
                operation = operation_name,
                attempt = attempt + 1,
                max_attempts = attempts,
                "starting attempt"
            );

            let outcome = match timeout(attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(StockError::Timeout {
                    operation: operation_name.to_string(),
                    after: attempt_timeout,
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation '{}' succeeded after {} retries", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!("Operation '{}' failed with non-retryable error", operation_name);
                    return Err(e);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        let backoff = self.backoff_duration(attempt + 1);
                        warn!(
                            "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                            operation_name,
                            attempt + 1,
                            attempts,
                            e,
                            backoff
                        );
                        sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| StockError::Other(format!("{operation_name}: retry failed with no error")));

        warn!(
            "Operation '{}' failed after {} attempts: {}",
            operation_name, attempts, error
        );

        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const GENEROUS: Duration = Duration::from_secs(5);

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(200));
        assert_eq!(policy.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10), 2.0);

        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        assert_eq!(policy.backoff_duration(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_execute_success_after_retry() {
        let policy = RetryPolicy::fast();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = policy
            .execute("quote", GENEROUS, || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(StockError::upstream("yahoo", "connection reset"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_all_attempts_fail() {
        let policy = RetryPolicy::fast();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<i32> = policy
            .execute("history", GENEROUS, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StockError::upstream("yahoo", "503"))
                }
            })
            .await;

        assert!(matches!(result, Err(StockError::UpstreamFetch { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_non_retryable_error() {
        let policy = RetryPolicy::fast();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<i32> = policy
            .execute("history", GENEROUS, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StockError::integrity("AAPL", "duplicate timestamp"))
                }
            })
            .await;

        assert!(matches!(result, Err(StockError::DataIntegrity { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out_each_attempt() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(10), 1.0);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<i32> = policy
            .execute("financials", Duration::from_millis(50), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::future::pending::<Result<i32>>().await
                }
            })
            .await;

        assert!(matches!(result, Err(StockError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
