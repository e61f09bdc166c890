//! Retry with exponential backoff and per-attempt timeouts for calls that
//! cross the platform boundary. Never used inside the decision engine.

use std::future::Future;

use adpilot_core::RetryPolicy;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError {
    pub operation: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Run `op` until it succeeds or `policy.max_attempts` is exhausted,
/// sleeping `policy.backoff_for_attempt` between attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        let result = match policy.attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("timed out after {}ms", limit.as_millis())),
            },
            None => op().await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = format!("{:#}", e);
                if attempt + 1 < max_attempts {
                    let delay = policy.backoff_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %last_error,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(RetryError {
        operation: operation.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let value = with_retry(&fast_policy(3), "fetch", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                anyhow::bail!("rate limited");
            }
            Ok(n)
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_policy(4), "set_budget", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::anyhow!("platform unavailable"))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(
            err.to_string(),
            "set_budget failed after 4 attempt(s): platform unavailable"
        );
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let policy = RetryPolicy {
            attempt_timeout_ms: 10,
            ..fast_policy(2)
        };
        let err = with_retry(&policy, "fetch", || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(err.last_error.contains("timed out after 10ms"));
    }
}
