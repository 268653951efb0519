//! DataSourcePool / DataSinkPool (§4.4): pooled connections, health
//! checks, circuit breaker, error classifier, parameter binding, retries
//! and batching.

pub mod batch;
pub mod cancel;
pub mod circuit_breaker;
pub mod classify;
pub mod connection;
pub mod health;
pub mod params;
pub mod rest;
pub mod retry;
pub mod sink;
pub mod source;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::expr::Value;

pub use cancel::run_cancellable;
pub use circuit_breaker::CircuitBreaker;
pub use classify::{classify_sqlstate, classify_sqlx_error, ErrorClass};
pub use connection::{Pool, PoolConfig};
pub use health::{HealthState, HealthTracker};
pub use params::bind_named_parameters;
pub use rest::RestDataSourcePool;
pub use retry::RetryPolicy;
pub use sink::DataSinkPool;
pub use source::{DataSourcePool, Row_};

/// Either concrete backend a configured data source resolves to (§4.4,
/// §6 "Data-source wire contracts"), chosen once at load time from the
/// document's declared `type` (`SourceKind`).
pub enum DataSourceBackend {
    Database(Arc<DataSourcePool>),
    Rest(Arc<RestDataSourcePool>),
}

impl DataSourceBackend {
    pub async fn query(
        &self,
        query_name: &str,
        params: &HashMap<String, Value>,
        token: &CancellationToken,
    ) -> Result<Vec<Row_>> {
        match self {
            DataSourceBackend::Database(pool) => pool.query(query_name, params, token).await,
            DataSourceBackend::Rest(pool) => pool.query(query_name, params, token).await,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DataSourceBackend::Database(pool) => &pool.config.name,
            DataSourceBackend::Rest(pool) => &pool.config.name,
        }
    }

    pub fn parameter_names(&self) -> &[String] {
        match self {
            DataSourceBackend::Database(pool) => &pool.config.parameter_names,
            DataSourceBackend::Rest(pool) => &pool.config.parameter_names,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        match self {
            DataSourceBackend::Database(pool) => &pool.breaker,
            DataSourceBackend::Rest(pool) => &pool.breaker,
        }
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        match self {
            DataSourceBackend::Database(pool) => &pool.health,
            DataSourceBackend::Rest(pool) => &pool.health,
        }
    }

    pub fn metrics(&self) -> &Arc<crate::observability::PoolMetrics> {
        match self {
            DataSourceBackend::Database(pool) => &pool.metrics,
            DataSourceBackend::Rest(pool) => &pool.metrics,
        }
    }
}
