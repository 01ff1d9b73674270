//! Exponential-backoff retry around agent calls.
//!
//! Only recoverable errors (transient provider failures, per-call timeouts)
//! are retried; validation, schema-mismatch, and configuration errors
//! propagate immediately.

use std::future::Future;
use std::time::Duration;

use crate::errors::Result;

/// Retry configuration: 3 attempts, 500 ms base delay, ×2.0 backoff,
/// ±20 % jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Execute an operation with exponential backoff.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay();

    loop {
        attempt += 1;
        tracing::debug!(
            operation = operation_name,
            attempt,
            max_attempts = policy.max_attempts,
            "Executing agent operation"
        );

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Agent operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Agent operation failed after all retries"
                    );
                    return Err(e);
                }
                if !e.is_retryable() {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "Agent operation error is not retryable"
                    );
                    return Err(e);
                }

                let actual_delay = if policy.jitter > 0.0 {
                    let low = 1.0 - policy.jitter;
                    let span = 2.0 * policy.jitter;
                    let factor = low + rand::random::<f64>() * span;
                    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
                } else {
                    delay
                };

                tracing::info!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    delay_ms = actual_delay.as_millis(),
                    "Agent operation failed, retrying after delay"
                );

                tokio::time::sleep(actual_delay).await;

                delay = std::cmp::min(
                    Duration::from_millis((delay.as_millis() as f64 * policy.multiplier) as u64),
                    policy.max_delay(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WorkflowError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = call_with_retry(&fast_policy(), "test_op", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(WorkflowError::provider_unavailable("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let attempts = AtomicU32::new(0);
        let result: crate::errors::Result<i32> = call_with_retry(&fast_policy(), "test_op", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(WorkflowError::schema_validation("bad shape")) }
        })
        .await;

        assert!(matches!(result, Err(WorkflowError::SchemaValidation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let attempts = AtomicU32::new(0);
        let result: crate::errors::Result<i32> = call_with_retry(&fast_policy(), "test_op", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(WorkflowError::provider_unavailable("always down")) }
        })
        .await;

        assert!(matches!(result, Err(WorkflowError::ProviderUnavailable(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
