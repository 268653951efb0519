//! DataSourcePool (§4.4): wires connection pooling, health checks, the
//! circuit breaker, error classification and retries around a single
//! configured data source.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ApexError, Result};
use crate::expr::Value;
use crate::model::DataSourceConfig;
use crate::observability::PoolMetrics;

use super::circuit_breaker::CircuitBreaker;
use super::classify::{classify_sqlx_error, ErrorClass};
use super::health::{HealthState, HealthTracker};
use super::params::bind_named_parameters;
use super::retry::{with_retry, RetryPolicy};

/// A single row from a lookup query, keyed by column name.
pub type Row_ = HashMap<String, Value>;

/// A pooled, health-checked, circuit-breaker-protected source of rows.
/// Backed by `sqlx::PgPool` for the database case (§6: "speaks the target
/// backend's wire protocol via the environment's driver").
pub struct DataSourcePool {
    pub config: DataSourceConfig,
    pool: PgPool,
    pub health: Arc<HealthTracker>,
    pub breaker: Arc<CircuitBreaker>,
    pub metrics: Arc<PoolMetrics>,
    retry_policy: RetryPolicy,
}

impl DataSourcePool {
    pub async fn connect(config: DataSourceConfig, connection_url: &str) -> Result<Self> {
        let conn = &config.connection;
        let pool = PgPoolOptions::new()
            .min_connections(conn.pool_min)
            .max_connections(conn.pool_max.max(conn.pool_initial).max(1))
            .acquire_timeout(Duration::from_millis(conn.connection_timeout_ms))
            .idle_timeout(Some(Duration::from_millis(conn.idle_timeout_ms)))
            .max_lifetime(Some(Duration::from_millis(conn.max_lifetime_ms)))
            .test_before_acquire(config.health_check.test_on_borrow)
            .connect(connection_url)
            .await?;

        let health = Arc::new(HealthTracker::new(
            config.health_check.failure_threshold,
            config.health_check.success_threshold,
        ));
        health.set_state(HealthState::Connected);

        let breaker = Arc::new(CircuitBreaker::new(
            config.name.clone(),
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.timeout_seconds,
        ));

        info!(source = %config.name, "data source pool connected");

        Ok(DataSourcePool {
            config,
            pool,
            health,
            breaker,
            metrics: Arc::new(PoolMetrics::new()),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Runs the configured health-check query once and records the result.
    pub async fn check_health(&self) -> bool {
        self.metrics.health_check_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let query = self
            .config
            .health_check
            .query
            .clone()
            .unwrap_or_else(|| "SELECT 1".to_string());
        let ok = sqlx::query(&query).fetch_optional(&self.pool).await.is_ok();
        if !ok {
            self.metrics
                .health_check_failures
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        ok
    }

    /// Executes a named query from `config.queries` against `params`, bound
    /// left-to-right per scan order (§4.4 "Parameter binding"). Retries
    /// transient failures with exponential backoff + jitter.
    pub async fn query(
        &self,
        query_name: &str,
        params: &HashMap<String, Value>,
        token: &CancellationToken,
    ) -> Result<Vec<Row_>> {
        self.breaker.guard()?;

        let template = self.config.queries.get(query_name).ok_or_else(|| {
            ApexError::Lookup(format!("unknown query '{query_name}' on source '{}'", self.config.name))
        })?;
        let (sql, bound, unknown) = bind_named_parameters(template, params);
        if !unknown.is_empty() {
            debug!(?unknown, "unbound named parameters left in query");
        }

        let result = with_retry(
            &self.retry_policy,
            &self.metrics,
            |e| classify_apex_error(e),
            token,
            || self.execute_once(&sql, &bound),
        )
        .await;

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(e) if !e.is_retryable() => self.breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    async fn execute_once(&self, sql: &str, bound: &[Value]) -> Result<Vec<Row_>> {
        let mut q = sqlx::query(sql);
        for value in bound {
            q = match value {
                Value::Int(i) => q.bind(*i),
                Value::Float(f) => q.bind(*f),
                Value::String(s) => q.bind(s.clone()),
                Value::Bool(b) => q.bind(*b),
                Value::Null => q.bind(Option::<i64>::None),
                other => q.bind(other.to_string()),
            };
        }
        let rows = q.fetch_all(&self.pool).await.map_err(|e| map_sql_error(&e))?;
        Ok(rows.iter().map(row_to_map).collect())
    }
}

fn row_to_map(row: &sqlx::postgres::PgRow) -> Row_ {
    use sqlx::Column;
    let mut map = HashMap::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let value = row
            .try_get::<String, _>(name.as_str())
            .map(Value::String)
            .or_else(|_| row.try_get::<i64, _>(name.as_str()).map(Value::Int))
            .or_else(|_| row.try_get::<f64, _>(name.as_str()).map(Value::Float))
            .or_else(|_| row.try_get::<bool, _>(name.as_str()).map(Value::Bool))
            .unwrap_or(Value::Null);
        map.insert(name, value);
    }
    map
}

fn map_sql_error(err: &sqlx::Error) -> ApexError {
    match classify_sqlx_error(err) {
        ErrorClass::DataIntegrityViolation => ApexError::DataIntegrityViolation(err.to_string()),
        ErrorClass::Transient => ApexError::Transient(err.to_string()),
        ErrorClass::Configuration => ApexError::DataAccessConfiguration(err.to_string()),
        ErrorClass::Fatal => ApexError::Fatal(err.to_string()),
    }
}

fn classify_apex_error(err: &ApexError) -> ErrorClass {
    match err {
        ApexError::Transient(_) => ErrorClass::Transient,
        ApexError::DataIntegrityViolation(_) => ErrorClass::DataIntegrityViolation,
        ApexError::DataAccessConfiguration(_) => ErrorClass::Configuration,
        _ => ErrorClass::Fatal,
    }
}
