//! Cancellation composition (§5 "Cancellation"): every long-running I/O
//! call accepts a cancel token and races it against the operation's own
//! timeout. The effective per-call budget is `min(callerDeadline,
//! operationTimeout)`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ApexError, Result};

/// Runs `fut` to completion unless `token` fires or the composed deadline
/// elapses first. On cancellation returns `ApexError::Cancelled`; on
/// deadline expiry returns `ApexError::Timeout`.
pub async fn run_cancellable<T>(
    token: &CancellationToken,
    operation_timeout: Duration,
    caller_deadline: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let budget = match caller_deadline {
        Some(d) => operation_timeout.min(d),
        None => operation_timeout,
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ApexError::Cancelled),
        result = tokio::time::timeout(budget, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(ApexError::Timeout(budget)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelling_the_token_wins_over_a_slow_future() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            child.cancel();
        });
        let result: Result<()> = run_cancellable(&token, Duration::from_secs(5), None, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ApexError::Cancelled)));
    }

    #[tokio::test]
    async fn operation_timeout_fires_when_not_cancelled() {
        let token = CancellationToken::new();
        let result: Result<()> = run_cancellable(
            &token,
            Duration::from_millis(5),
            None,
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;
        assert!(matches!(result, Err(ApexError::Timeout(_))));
    }

    #[tokio::test]
    async fn caller_deadline_tightens_the_operation_timeout() {
        let token = CancellationToken::new();
        let started = std::time::Instant::now();
        let result: Result<()> = run_cancellable(
            &token,
            Duration::from_secs(5),
            Some(Duration::from_millis(5)),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;
        assert!(matches!(result, Err(ApexError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn successful_future_returns_its_value() {
        let token = CancellationToken::new();
        let result = run_cancellable(&token, Duration::from_secs(5), None, async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
