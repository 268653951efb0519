//! Circuit breaker (§4.4 "Circuit breaker", §8 seed scenario 6).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::error::{ApexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Tracks rolling failures for one protected resource and trips open after
/// `failure_threshold` consecutive failures, failing fast for
/// `timeout_seconds` before allowing a single half-open trial.
pub struct CircuitBreaker {
    resource: String,
    state: std::sync::Mutex<State>,
    failure_count: AtomicU32,
    failure_threshold: u32,
    opened_at_ms: AtomicU64,
    timeout_ms: u64,
}

impl CircuitBreaker {
    pub fn new(resource: impl Into<String>, failure_threshold: u32, timeout_seconds: u64) -> Self {
        CircuitBreaker {
            resource: resource.into(),
            state: std::sync::Mutex::new(State::Closed),
            failure_count: AtomicU32::new(0),
            failure_threshold,
            opened_at_ms: AtomicU64::new(0),
            timeout_ms: timeout_seconds * 1000,
        }
    }

    /// Call before attempting I/O. Returns `CircuitOpen` without touching
    /// the network if the breaker is tripped and the timeout hasn't
    /// elapsed; otherwise allows the call (including the single half-open
    /// trial).
    pub fn guard(&self) -> Result<()> {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        match *state {
            State::Closed => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open => {
                let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
                if now_ms().saturating_sub(opened_at) >= self.timeout_ms {
                    *state = State::HalfOpen;
                    info!(resource = %self.resource, "circuit breaker half-open trial");
                    Ok(())
                } else {
                    Err(ApexError::CircuitOpen {
                        resource: self.resource.clone(),
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        if *state != State::Closed {
            info!(resource = %self.resource, "circuit breaker closed after successful trial");
        }
        *state = State::Closed;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        if *state == State::HalfOpen {
            *state = State::Open;
            self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
            warn!(resource = %self.resource, "half-open trial failed, circuit re-opened");
            return;
        }
        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.failure_threshold && *state == State::Closed {
            *state = State::Open;
            self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
            warn!(resource = %self.resource, failures, "circuit breaker opened");
        }
    }

    pub fn is_open(&self) -> bool {
        *self.state.lock().expect("circuit breaker lock poisoned") == State::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures_and_fails_fast() {
        let breaker = CircuitBreaker::new("db", 3, 30);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.guard().is_ok());
        breaker.record_failure();
        assert!(breaker.is_open());
        let err = breaker.guard().unwrap_err();
        assert!(matches!(err, ApexError::CircuitOpen { .. }));
    }

    #[test]
    fn closes_again_after_successful_half_open_trial() {
        let breaker = CircuitBreaker::new("db", 1, 0);
        breaker.record_failure();
        assert!(breaker.is_open());
        // timeout_seconds=0, so the next guard() immediately half-opens.
        assert!(breaker.guard().is_ok());
        breaker.record_success();
        assert!(!breaker.is_open());
    }
}
