//! Generic pooled-connection scaffolding shared by the source and sink
//! pools (§4.4 "Pool"). Maintains `min..max` live connections, reaps idle
//! ones, and warns on suspected leaks — independent of what a "connection"
//! actually is (SQL client, HTTP client, …).

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ApexError, Result};
use crate::observability::PoolMetrics;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min: u32,
    pub initial: u32,
    pub max: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub leak_detection_threshold: Option<Duration>,
    /// §4.4 "Validation": gate the liveness check on borrow/return/idle-sweep.
    pub test_on_borrow: bool,
    pub test_on_return: bool,
    pub test_while_idle: bool,
    /// Throttles how often a slot already validated recently is re-checked.
    pub validation_interval: Duration,
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min <= self.initial && self.initial <= self.max) {
            return Err(ApexError::configuration(
                "pool config requires 0 <= min <= initial <= max",
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(ApexError::configuration("connectionTimeout must be strictly positive"));
        }
        Ok(())
    }
}

struct Slot<C> {
    conn: C,
    created_at: Instant,
    last_used: Instant,
    last_validated: Instant,
}

type Factory<C> =
    Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<C>> + Send>> + Send + Sync>;

type Validator<C> =
    Arc<dyn Fn(&C) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

struct PoolInner<C> {
    idle: Mutex<VecDeque<Slot<C>>>,
    active: AtomicI64,
    semaphore: Arc<Semaphore>,
    config: PoolConfig,
    factory: Factory<C>,
    validator: Option<Validator<C>>,
    metrics: Arc<PoolMetrics>,
}

/// A borrowed connection. Returned to the pool on drop unless its lifetime
/// has elapsed, in which case it is dropped for real and the pool is free
/// to open a replacement on the next borrow.
pub struct Lease<C> {
    slot: Option<Slot<C>>,
    pool: Arc<PoolInner<C>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl<C> std::ops::Deref for Lease<C> {
    type Target = C;
    fn deref(&self) -> &C {
        &self.slot.as_ref().expect("lease slot present until drop").conn
    }
}

impl<C> std::ops::DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.slot.as_mut().expect("lease slot present until drop").conn
    }
}

impl<C: Send + 'static> Drop for Lease<C> {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else { return };
        self.pool.active.fetch_sub(1, Ordering::SeqCst);
        if slot.created_at.elapsed() >= self.pool.config.max_lifetime {
            return; // expired — dropped for real, not returned to idle.
        }
        let pool = self.pool.clone();
        let returned = Slot { last_used: Instant::now(), ..slot };
        tokio::spawn(async move {
            let returned = if pool.config.test_on_return {
                match &pool.validator {
                    Some(validator) if !(validator)(&returned.conn).await => return,
                    Some(_) => Slot { last_validated: Instant::now(), ..returned },
                    None => returned,
                }
            } else {
                returned
            };
            pool.idle.lock().await.push_back(returned);
        });
    }
}

/// A pool of `min..max` connections of type `C`, created on demand by
/// `factory`.
pub struct Pool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Send + 'static> Pool<C> {
    pub fn new<F, Fut>(config: PoolConfig, metrics: Arc<PoolMetrics>, factory: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C>> + Send + 'static,
    {
        config.validate()?;
        let max = config.max as usize;
        let inner = Arc::new(PoolInner {
            idle: Mutex::new(VecDeque::with_capacity(max)),
            active: AtomicI64::new(0),
            semaphore: Arc::new(Semaphore::new(max)),
            config,
            factory: Box::new(move || Box::pin(factory())),
            validator: None,
            metrics,
        });
        Ok(Pool { inner })
    }

    /// Attaches a liveness-check closure, enabling `testOnBorrow`/
    /// `testOnReturn`/`testWhileIdle` gating (§4.4 "Validation"). Must be
    /// called before the pool is cloned/shared.
    pub fn with_validator<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(&C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let validator: Validator<C> = Arc::new(move |c| Box::pin(validator(c)));
        Arc::get_mut(&mut self.inner)
            .expect("with_validator must run before the pool is shared")
            .validator = Some(validator);
        self
    }

    /// Eagerly opens `initial` connections (§4.4 "initial created eagerly").
    pub async fn warm_up(&self) -> Result<()> {
        let mut created = Vec::new();
        for _ in 0..self.inner.config.initial {
            created.push(self.open_new().await?);
        }
        let mut idle = self.inner.idle.lock().await;
        idle.extend(created);
        Ok(())
    }

    async fn open_new(&self) -> Result<Slot<C>> {
        self.inner.metrics.connection_attempts.fetch_add(1, Ordering::Relaxed);
        match (self.inner.factory)().await {
            Ok(conn) => {
                let now = Instant::now();
                Ok(Slot { conn, created_at: now, last_used: now, last_validated: now })
            }
            Err(e) => {
                self.inner.metrics.connection_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Borrows a connection, blocking up to `connectionTimeout` (§4.4
    /// "Pool"). Returns `Timeout` if none becomes available in time, or
    /// `Cancelled` if `token` fires first (§5 "Cancellation").
    pub async fn acquire(&self, token: &CancellationToken) -> Result<Lease<C>> {
        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ApexError::Cancelled),
            result = tokio::time::timeout(
                self.inner.config.connection_timeout,
                self.inner.semaphore.clone().acquire_owned(),
            ) => {
                result
                    .map_err(|_| ApexError::Timeout(self.inner.config.connection_timeout))?
                    .map_err(|_| ApexError::internal("pool semaphore closed"))?
            }
        };

        let slot = {
            let mut idle = self.inner.idle.lock().await;
            idle.pop_front()
        };
        let mut slot = match slot {
            Some(s) => s,
            None => self.open_new().await?,
        };

        if self.inner.config.test_on_borrow {
            if let Some(validator) = &self.inner.validator {
                if slot.last_validated.elapsed() >= self.inner.config.validation_interval {
                    if (validator)(&slot.conn).await {
                        slot.last_validated = Instant::now();
                    } else {
                        slot = self.open_new().await?;
                    }
                }
            }
        }

        self.inner.active.fetch_add(1, Ordering::SeqCst);

        if let Some(threshold) = self.inner.config.leak_detection_threshold {
            let pool = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(threshold).await;
                if pool.active.load(Ordering::SeqCst) > 0 {
                    warn!(?threshold, "connection borrowed past leak detection threshold");
                }
            });
        }

        Ok(Lease {
            slot: Some(slot),
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    pub fn active_count(&self) -> i64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Evicts idle connections past `idleTimeout` while preserving `min`
    /// (§4.4 "idle reaper"), then, if `testWhileIdle` is on, validates the
    /// remaining idle slots due for a re-check and drops any that fail.
    pub async fn reap_idle(&self) {
        let mut idle = self.inner.idle.lock().await;
        let min = self.inner.config.min as usize;
        let timeout = self.inner.config.idle_timeout;
        while idle.len() > min {
            match idle.front() {
                Some(front) if front.last_used.elapsed() > timeout => {
                    idle.pop_front();
                }
                _ => break,
            }
        }

        if self.inner.config.test_while_idle {
            if let Some(validator) = &self.inner.validator {
                let mut kept = VecDeque::with_capacity(idle.len());
                while let Some(mut slot) = idle.pop_front() {
                    if slot.last_validated.elapsed() >= self.inner.config.validation_interval {
                        if !(validator)(&slot.conn).await {
                            continue;
                        }
                        slot.last_validated = Instant::now();
                    }
                    kept.push_back(slot);
                }
                *idle = kept;
            }
        }
    }
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Pool { inner: self.inner.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn test_config() -> PoolConfig {
        PoolConfig {
            min: 1,
            initial: 1,
            max: 2,
            connection_timeout: Duration::from_millis(200),
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(3600),
            leak_detection_threshold: None,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            validation_interval: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn pool_bounds_hold_and_borrow_succeeds_within_timeout() {
        let metrics = Arc::new(PoolMetrics::new());
        let counter = Arc::new(AtomicU32::new(0));
        let c2 = counter.clone();
        let pool: Pool<u32> = Pool::new(test_config(), metrics, move || {
            let c = c2.clone();
            async move { Ok(c.fetch_add(1, Ordering::SeqCst)) }
        })
        .unwrap();
        pool.warm_up().await.unwrap();
        let token = CancellationToken::new();
        let lease = pool.acquire(&token).await.unwrap();
        assert!(*lease < 10);
        assert_eq!(pool.active_count(), 1);
    }

    #[tokio::test]
    async fn acquire_fails_fast_when_token_is_already_cancelled() {
        let metrics = Arc::new(PoolMetrics::new());
        let pool: Pool<u32> = Pool::new(test_config(), metrics, || async { Ok(0) }).unwrap();
        pool.warm_up().await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = pool.acquire(&token).await;
        assert!(matches!(result, Err(ApexError::Cancelled)));
    }

    #[tokio::test]
    async fn test_on_borrow_discards_a_failed_slot() {
        let metrics = Arc::new(PoolMetrics::new());
        let counter = Arc::new(AtomicU32::new(0));
        let c2 = counter.clone();
        let mut config = test_config();
        config.test_on_borrow = true;
        config.validation_interval = Duration::ZERO;
        let pool: Pool<u32> = Pool::new(config, metrics, move || {
            let c = c2.clone();
            async move { Ok(c.fetch_add(1, Ordering::SeqCst)) }
        })
        .unwrap()
        .with_validator(|_: &u32| async { false });
        pool.warm_up().await.unwrap();
        let token = CancellationToken::new();
        let lease = pool.acquire(&token).await.unwrap();
        // the warmed-up slot (value 0) failed validation and was replaced.
        assert_eq!(*lease, 1);
    }

    #[test]
    fn rejects_invalid_bounds() {
        let mut config = test_config();
        config.min = 5;
        config.max = 2;
        assert!(config.validate().is_err());
    }
}
