//! REST-backed data source pool (§4.4, §6 "Data-source wire contracts":
//! "HTTP/1.1+; JSON default; request shape is defined per endpoint
//! template; response mapping consumes a root JSONPath"). Reuses the
//! generic `connection::Pool<C>` scaffolding with `C = reqwest::Client`,
//! so borrow/lifetime/leak-detection/validation behave identically to the
//! SQL backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ApexError, Result};
use crate::expr::Value;
use crate::model::DataSourceConfig;
use crate::observability::PoolMetrics;

use super::cancel::run_cancellable;
use super::circuit_breaker::CircuitBreaker;
use super::classify::ErrorClass;
use super::connection::{Pool, PoolConfig};
use super::health::HealthTracker;
use super::retry::{with_retry, RetryPolicy};
use super::source::Row_;

type HmacSha256 = Hmac<Sha256>;

/// Replaces `:name` tokens in `template` with the stringified value looked
/// up in `params`. The REST analogue of §4.4 "Parameter binding" — there is
/// no prepared-statement bind list on the HTTP side, so substitution is
/// literal string replacement into the URL.
fn substitute_named_parameters(template: &str, params: &HashMap<String, Value>) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ':' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            if end > start {
                let name: String = chars[start..end].iter().collect();
                match params.get(&name) {
                    Some(v) => out.push_str(&v.to_string()),
                    None => {
                        tracing::debug!(%name, "unbound named parameter left in REST endpoint template");
                        out.push(':');
                        out.push_str(&name);
                    }
                }
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Resolves a minimal dotted JSONPath (`$.data.rows`) against a decoded
/// response body, matching the `dataPath`/`errorPath`/... fields a
/// `ResponseMapping` carries.
fn resolve_path(value: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    let mut current = value.clone();
    for segment in path.trim_start_matches('$').trim_start_matches('.').split('.') {
        if segment.is_empty() {
            continue;
        }
        current = current.get(segment)?.clone();
    }
    Some(current)
}

fn row_from_json_object(value: serde_json::Value) -> Row_ {
    match value {
        serde_json::Value::Object(map) => map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        other => {
            let mut row = HashMap::new();
            row.insert("value".to_string(), Value::from(other));
            row
        }
    }
}

fn rows_from_json(value: serde_json::Value) -> Vec<Row_> {
    match value {
        serde_json::Value::Array(items) => items.into_iter().map(row_from_json_object).collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![row_from_json_object(other)],
    }
}

fn classify_apex_error(err: &ApexError) -> ErrorClass {
    match err {
        ApexError::Transient(_) => ErrorClass::Transient,
        ApexError::DataAccessConfiguration(_) => ErrorClass::Configuration,
        ApexError::DataIntegrityViolation(_) => ErrorClass::DataIntegrityViolation,
        _ => ErrorClass::Fatal,
    }
}

/// A pooled, health-checked, circuit-breaker-protected REST data source
/// (§6 "REST"), the `SourceKind::RestApi` counterpart to `DataSourcePool`.
pub struct RestDataSourcePool {
    pub config: DataSourceConfig,
    pool: Pool<reqwest::Client>,
    pub health: Arc<HealthTracker>,
    pub breaker: Arc<CircuitBreaker>,
    pub metrics: Arc<PoolMetrics>,
    retry_policy: RetryPolicy,
}

impl RestDataSourcePool {
    pub async fn connect(config: DataSourceConfig) -> Result<Self> {
        let conn = &config.connection;
        let health_check = config.health_check.clone();
        let pool_config = PoolConfig {
            min: conn.pool_min,
            initial: conn.pool_initial.min(conn.pool_max.max(1)),
            max: conn.pool_max.max(1),
            connection_timeout: Duration::from_millis(conn.connection_timeout_ms),
            idle_timeout: Duration::from_millis(conn.idle_timeout_ms),
            max_lifetime: Duration::from_millis(conn.max_lifetime_ms),
            leak_detection_threshold: if conn.leak_detection_threshold_ms > 0 {
                Some(Duration::from_millis(conn.leak_detection_threshold_ms))
            } else {
                None
            },
            test_on_borrow: health_check.test_on_borrow,
            test_on_return: health_check.test_on_return,
            test_while_idle: health_check.test_while_idle,
            validation_interval: Duration::from_millis(health_check.validation_interval_ms),
        };

        let metrics = Arc::new(PoolMetrics::new());
        let pool: Pool<reqwest::Client> =
            Pool::new(pool_config, metrics.clone(), || async { reqwest::Client::builder().build().map_err(ApexError::Http) })?;

        let pool = match health_check.endpoint.clone() {
            Some(endpoint) => pool.with_validator(move |client: &reqwest::Client| {
                let client = client.clone();
                let endpoint = endpoint.clone();
                async move { client.get(&endpoint).send().await.map(|r| r.status().is_success()).unwrap_or(false) }
            }),
            None => pool,
        };
        pool.warm_up().await?;

        let health = Arc::new(HealthTracker::new(config.health_check.failure_threshold, config.health_check.success_threshold));
        health.set_state(super::health::HealthState::Connected);

        let breaker = Arc::new(CircuitBreaker::new(
            config.name.clone(),
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.timeout_seconds,
        ));

        info!(source = %config.name, "REST data source pool connected");

        Ok(RestDataSourcePool { config, pool, health, breaker, metrics, retry_policy: RetryPolicy::default() })
    }

    /// Runs the configured health-check endpoint once and records the
    /// result, mirroring `DataSourcePool::check_health`'s SQL counterpart.
    pub async fn check_health(&self, token: &CancellationToken) -> bool {
        self.metrics.health_check_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let Some(endpoint) = self.config.health_check.endpoint.clone() else {
            return true;
        };
        let ok = match self.pool.acquire(token).await {
            Ok(lease) => lease
                .get(&endpoint)
                .timeout(Duration::from_millis(self.config.health_check.timeout_ms))
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false),
            Err(_) => false,
        };
        if !ok {
            self.metrics.health_check_failures.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        ok
    }

    /// Calls the named endpoint template, binds `:name` parameters into
    /// the URL, and maps the JSON response through `responseMapping`.
    pub async fn query(&self, query_name: &str, params: &HashMap<String, Value>, token: &CancellationToken) -> Result<Vec<Row_>> {
        self.breaker.guard()?;

        let template = self.config.endpoints.get(query_name).ok_or_else(|| {
            ApexError::Lookup(format!("unknown endpoint '{query_name}' on source '{}'", self.config.name))
        })?;
        let url = substitute_named_parameters(template, params);
        url::Url::parse(&url).map_err(|e| ApexError::DataAccessConfiguration(format!("invalid REST endpoint URL '{url}': {e}")))?;

        let result = with_retry(&self.retry_policy, &self.metrics, classify_apex_error, token, || self.execute_once(&url, token)).await;

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(e) if !e.is_retryable() => self.breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    async fn execute_once(&self, url: &str, token: &CancellationToken) -> Result<Vec<Row_>> {
        let lease = self.pool.acquire(token).await?;
        let request_id = uuid::Uuid::new_v4();
        let mut builder = lease.get(url).header("X-Request-Id", request_id.to_string());
        if let Some(signature) = self.sign_request("GET", url) {
            builder = builder.header("Authorization", format!("HMAC {signature}"));
        }
        drop(lease);

        let timeout = Duration::from_millis(self.config.connection.connection_timeout_ms);
        let response = run_cancellable(token, timeout, None, async { builder.send().await.map_err(ApexError::Http) }).await?;

        let status = response.status();
        let body_bytes: bytes::Bytes = response.bytes().await.map_err(ApexError::Http)?;
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            let message = resolve_path(&body, &self.config.response_mapping.message_path)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("REST call to '{url}' failed with status {status}"));
            return Err(if status.is_server_error() {
                ApexError::Transient(message)
            } else {
                ApexError::DataAccessConfiguration(message)
            });
        }

        if let Some(error_value) = resolve_path(&body, &self.config.response_mapping.error_path) {
            if !error_value.is_null() {
                return Err(ApexError::DataAccessConfiguration(error_value.to_string()));
            }
        }

        let data = resolve_path(&body, &self.config.response_mapping.data_path).unwrap_or(body);
        Ok(rows_from_json(data))
    }

    /// HMAC-SHA256 request signing, keyed by an environment-provided
    /// secret (credentials never live in the YAML document itself, the
    /// same convention `connection_url` follows for database passwords).
    /// Sources with no configured secret skip signing.
    fn sign_request(&self, method: &str, url: &str) -> Option<String> {
        let secret = std::env::var(format!("APEX_HMAC_SECRET_{}", self.config.name.to_uppercase())).ok()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(method.as_bytes());
        mac.update(url.as_bytes());
        Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_parameters_and_leaves_unknown_ones() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), Value::String("CPTY001".into()));
        let url = substitute_named_parameters("https://host/api/counterparty/:id/:missing", &params);
        assert_eq!(url, "https://host/api/counterparty/CPTY001/:missing");
    }

    #[test]
    fn resolves_a_dotted_json_path() {
        let body: serde_json::Value = serde_json::json!({"data": {"rows": [{"id": 1}]}});
        let resolved = resolve_path(&body, "$.data.rows").unwrap();
        assert_eq!(resolved, serde_json::json!([{"id": 1}]));
    }

    #[test]
    fn rows_from_json_wraps_a_single_object_as_one_row() {
        let rows = rows_from_json(serde_json::json!({"name": "Goldman Sachs"}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::String("Goldman Sachs".into())));
    }
}
