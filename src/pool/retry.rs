//! Retry policy (§4.4 "Retries", §9 open question: exponential backoff
//! with full jitter, applied only to `Transient` classifications).

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ApexError, Result};
use crate::observability::PoolMetrics;

use super::classify::ErrorClass;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// `delay = random(0, min(cap, base * 2^attempt))` — full jitter.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.cap.as_millis());
        let capped = capped.max(1) as u64;
        let jittered = rand::thread_rng().gen_range(0..=capped);
        Duration::from_millis(jittered)
    }
}

/// Runs `op` under this policy, retrying only when the failure classifies
/// as `Transient`. Non-retryable classifications return immediately.
/// `token` is checked around both the attempt itself and any backoff sleep
/// between attempts (§5 "Cancellation" — retry backoffs are a suspension
/// point a caller must be able to abandon).
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    metrics: &PoolMetrics,
    classify: impl Fn(&ApexError) -> ErrorClass,
    token: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ApexError::Cancelled),
            outcome = op() => outcome,
        };
        match outcome {
            Ok(value) => {
                if attempt > 0 {
                    metrics.retry_successes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
                return Ok(value);
            }
            Err(e) => {
                let class = classify(&e);
                if !class.is_retryable() || attempt >= policy.max_retries {
                    return Err(e);
                }
                metrics.retry_attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let delay = policy.backoff_for_attempt(attempt);
                warn!(attempt, ?delay, error = %e, "retrying after transient error");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(ApexError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded_by_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            cap: Duration::from_millis(500),
        };
        for attempt in 0..10 {
            let d = policy.backoff_for_attempt(attempt);
            assert!(d <= Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn retries_only_transient_classification() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        };
        let metrics = PoolMetrics::new();
        let mut calls = 0;
        let token = CancellationToken::new();
        let result: Result<()> = with_retry(
            &policy,
            &metrics,
            |_| ErrorClass::Configuration,
            &token,
            || {
                calls += 1;
                async { Err(ApexError::DataAccessConfiguration("bad table".into())) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn cancelling_the_token_stops_the_retry_loop() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(50),
            cap: Duration::from_millis(200),
        };
        let metrics = PoolMetrics::new();
        let token = CancellationToken::new();
        token.cancel();
        let mut calls = 0;
        let result: Result<()> = with_retry(
            &policy,
            &metrics,
            |_| ErrorClass::Transient,
            &token,
            || {
                calls += 1;
                async { Err(ApexError::Transient("connection reset".into())) }
            },
        )
        .await;
        assert!(matches!(result, Err(ApexError::Cancelled)));
    }
}
