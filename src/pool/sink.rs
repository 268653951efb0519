//! DataSinkPool (§4.4 symmetric write side, §5 "Transaction discipline").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{ApexError, Result};
use crate::expr::Value;
use crate::model::datasource::TransactionMode;
use crate::model::DataSinkConfig;
use crate::observability::PoolMetrics;

use super::batch::BatchOutcome;
use super::circuit_breaker::CircuitBreaker;
use super::classify::classify_sqlx_error;
use super::params::bind_named_parameters;

pub struct DataSinkPool {
    pub config: DataSinkConfig,
    pool: PgPool,
    pub breaker: Arc<CircuitBreaker>,
    pub metrics: Arc<PoolMetrics>,
}

impl DataSinkPool {
    pub async fn connect(config: DataSinkConfig, connection_url: &str) -> Result<Self> {
        let conn = &config.connection;
        let pool = PgPoolOptions::new()
            .min_connections(conn.pool_min)
            .max_connections(conn.pool_max.max(conn.pool_initial).max(1))
            .acquire_timeout(Duration::from_millis(conn.connection_timeout_ms))
            .test_before_acquire(config.health_check.test_on_borrow)
            .connect(connection_url)
            .await?;

        let breaker = Arc::new(CircuitBreaker::new(
            config.name.clone(),
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.timeout_seconds,
        ));

        info!(sink = %config.name, "data sink pool connected");

        Ok(DataSinkPool {
            config,
            pool,
            breaker,
            metrics: Arc::new(PoolMetrics::new()),
        })
    }

    /// Writes `rows` through the named operation template, honoring the
    /// sink's `transactionMode`. `per-batch` commits or rolls back the
    /// whole set atomically; the others are reported per-row.
    pub async fn write_batch(
        &self,
        operation_name: &str,
        rows: &[HashMap<String, Value>],
        token: &CancellationToken,
    ) -> Result<BatchOutcome> {
        self.breaker.guard()?;
        if token.is_cancelled() {
            return Err(ApexError::Cancelled);
        }
        let template = self.config.operations.get(operation_name).ok_or_else(|| {
            ApexError::Lookup(format!(
                "unknown operation '{operation_name}' on sink '{}'",
                self.config.name
            ))
        })?;

        let outcome = match self.config.batch.transaction_mode {
            TransactionMode::PerBatch | TransactionMode::Global => {
                self.write_transactional(template, rows, token).await
            }
            TransactionMode::PerRecord | TransactionMode::None => {
                self.write_per_record(template, rows, token).await
            }
        };

        let start = std::time::Instant::now();
        match &outcome {
            Ok(o) if o.is_success() => {
                self.breaker.record_success();
                self.metrics.batches_successful.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            Ok(BatchOutcome::Partial { .. }) => {
                self.metrics.batches_partial.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            _ => {
                self.breaker.record_failure();
                self.metrics.batches_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
        self.metrics.record_write(start.elapsed());
        outcome
    }

    async fn write_transactional(
        &self,
        template: &str,
        rows: &[HashMap<String, Value>],
        token: &CancellationToken,
    ) -> Result<BatchOutcome> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            if token.is_cancelled() {
                tx.rollback().await.ok();
                return Err(ApexError::Cancelled);
            }
            let (sql, bound, _unknown) = bind_named_parameters(template, row);
            let mut q = sqlx::query(&sql);
            for value in &bound {
                q = bind_value(q, value);
            }
            if let Err(e) = q.execute(&mut *tx).await {
                tx.rollback().await.ok();
                error!(error = %e, "per-batch transaction rolled back");
                return Ok(BatchOutcome::Failed {
                    count: rows.len(),
                    error: e.to_string(),
                });
            }
        }
        tx.commit().await?;
        Ok(BatchOutcome::Successful { count: rows.len() })
    }

    async fn write_per_record(
        &self,
        template: &str,
        rows: &[HashMap<String, Value>],
        token: &CancellationToken,
    ) -> Result<BatchOutcome> {
        let mut successful = 0;
        let mut errors = Vec::new();
        for row in rows {
            if token.is_cancelled() {
                errors.push(ApexError::Cancelled.to_string());
                break;
            }
            let (sql, bound, _unknown) = bind_named_parameters(template, row);
            let mut q = sqlx::query(&sql);
            for value in &bound {
                q = bind_value(q, value);
            }
            match q.execute(&self.pool).await {
                Ok(_) => successful += 1,
                Err(e) => {
                    let class = classify_sqlx_error(&e);
                    errors.push(format!("{class:?}: {e}"));
                }
            }
        }
        if errors.is_empty() {
            Ok(BatchOutcome::Successful { count: successful })
        } else if successful == 0 {
            Ok(BatchOutcome::Failed {
                count: rows.len(),
                error: errors.join("; "),
            })
        } else {
            Ok(BatchOutcome::Partial {
                successful,
                failed: errors.len(),
                errors,
            })
        }
    }
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Int(i) => q.bind(*i),
        Value::Float(f) => q.bind(*f),
        Value::String(s) => q.bind(s.clone()),
        Value::Bool(b) => q.bind(*b),
        Value::Null => q.bind(Option::<i64>::None),
        other => q.bind(other.to_string()),
    }
}
