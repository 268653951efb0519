//! Health-check state machine (§4.4 "Health check loop"): consecutive
//! success/failure tracking against configurable thresholds, driving a
//! periodic polling loop.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    NotInitialized,
    Connecting,
    Connected,
    Degraded,
    Unhealthy,
    Shutdown,
    Error,
}

/// Tracks consecutive successes/failures and derives [`HealthState`] from
/// the configured thresholds (default 3 failures / 1 success, per §4.4).
pub struct HealthTracker {
    state: std::sync::Mutex<HealthState>,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    failure_threshold: u32,
    success_threshold: u32,
    last_check_unix_ms: AtomicU64,
}

impl HealthTracker {
    pub fn new(failure_threshold: u32, success_threshold: u32) -> Self {
        HealthTracker {
            state: std::sync::Mutex::new(HealthState::NotInitialized),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            failure_threshold,
            success_threshold,
            last_check_unix_ms: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> HealthState {
        *self.state.lock().expect("health state lock poisoned")
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        let successes = self.consecutive_successes.fetch_add(1, Ordering::SeqCst) + 1;
        self.touch();
        if successes >= self.success_threshold {
            let mut state = self.state.lock().expect("health state lock poisoned");
            if *state != HealthState::Connected {
                debug!("health check recovered, marking Connected");
            }
            *state = HealthState::Connected;
        }
    }

    pub fn record_failure(&self) {
        self.consecutive_successes.store(0, Ordering::SeqCst);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        self.touch();
        let mut state = self.state.lock().expect("health state lock poisoned");
        if failures >= self.failure_threshold {
            if *state != HealthState::Unhealthy {
                warn!(failures, "health check threshold exceeded, marking Unhealthy");
            }
            *state = HealthState::Unhealthy;
        } else if *state == HealthState::Connected {
            *state = HealthState::Degraded;
        }
    }

    pub fn set_state(&self, new_state: HealthState) {
        *self.state.lock().expect("health state lock poisoned") = new_state;
    }

    fn touch(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        self.last_check_unix_ms.store(now, Ordering::SeqCst);
    }
}

/// Runs `check` every `interval` until `shutdown` resolves, updating
/// `tracker` with the observed result.
pub async fn run_health_check_loop<F, Fut>(
    tracker: std::sync::Arc<HealthTracker>,
    interval: Duration,
    mut check: F,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if check().await {
                    tracker.record_success();
                } else {
                    tracker.record_failure();
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracker.set_state(HealthState::Shutdown);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_unhealthy_after_threshold_failures() {
        let tracker = HealthTracker::new(3, 1);
        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.state(), HealthState::NotInitialized);
        tracker.record_failure();
        assert_eq!(tracker.state(), HealthState::Unhealthy);
    }

    #[test]
    fn recovers_to_connected_on_success_threshold() {
        let tracker = HealthTracker::new(3, 1);
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.state(), HealthState::Unhealthy);
        tracker.record_success();
        assert_eq!(tracker.state(), HealthState::Connected);
    }
}
