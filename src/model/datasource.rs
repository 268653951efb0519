//! Data-source / data-sink configuration model (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Database,
    RestApi,
    MessageQueue,
    Cache,
    FileSystem,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "poolMin", default)]
    pub pool_min: u32,
    #[serde(rename = "poolInitial", default)]
    pub pool_initial: u32,
    #[serde(rename = "poolMax", default = "default_pool_max")]
    pub pool_max: u32,
    #[serde(rename = "connectionTimeoutMs", default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(rename = "idleTimeoutMs", default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(rename = "maxLifetimeMs", default = "default_max_lifetime_ms")]
    pub max_lifetime_ms: u64,
    #[serde(rename = "leakDetectionThresholdMs", default)]
    pub leak_detection_threshold_ms: u64,
}

fn default_pool_max() -> u32 {
    10
}
fn default_connection_timeout_ms() -> u64 {
    5_000
}
fn default_idle_timeout_ms() -> u64 {
    600_000
}
fn default_max_lifetime_ms() -> u64 {
    1_800_000
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(rename = "ttlSeconds", default)]
    pub ttl_seconds: u64,
    #[serde(default)]
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(rename = "intervalSeconds", default = "default_health_interval")]
    pub interval_seconds: u64,
    #[serde(rename = "timeoutMs", default = "default_health_timeout_ms")]
    pub timeout_ms: u64,
    pub query: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "failureThreshold", default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(rename = "successThreshold", default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Gates the liveness check on borrow/return/idle-sweep (§4.4 "Validation").
    #[serde(rename = "testOnBorrow", default = "default_true")]
    pub test_on_borrow: bool,
    #[serde(rename = "testOnReturn", default)]
    pub test_on_return: bool,
    #[serde(rename = "testWhileIdle", default)]
    pub test_while_idle: bool,
    /// Throttles how often an already-validated connection is re-checked.
    #[serde(rename = "validationIntervalMs", default = "default_validation_interval_ms")]
    pub validation_interval_ms: u64,
}

fn default_health_interval() -> u64 {
    30
}
fn default_health_timeout_ms() -> u64 {
    2_000
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_success_threshold() -> u32 {
    1
}
fn default_validation_interval_ms() -> u64 {
    30_000
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        HealthCheckConfig {
            interval_seconds: default_health_interval(),
            timeout_ms: default_health_timeout_ms(),
            query: Some("SELECT 1".to_string()),
            endpoint: None,
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            test_on_borrow: true,
            test_on_return: false,
            test_while_idle: false,
            validation_interval_ms: default_validation_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CircuitBreakerConfig {
    #[serde(rename = "failureThreshold", default = "default_cb_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(rename = "timeoutSeconds", default = "default_cb_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_cb_failure_threshold() -> u32 {
    5
}
fn default_cb_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseMapping {
    #[serde(rename = "dataPath", default = "default_data_path")]
    pub data_path: String,
    #[serde(rename = "errorPath", default = "default_error_path")]
    pub error_path: String,
    #[serde(rename = "statusPath", default = "default_status_path")]
    pub status_path: String,
    #[serde(rename = "messagePath", default = "default_message_path")]
    pub message_path: String,
}

fn default_data_path() -> String {
    "$.data".into()
}
fn default_error_path() -> String {
    "$.error".into()
}
fn default_status_path() -> String {
    "$.status".into()
}
fn default_message_path() -> String {
    "$.message".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<SourceKind>,
    #[serde(rename = "sourceType", default)]
    pub source_type: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub implementation: Option<String>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(rename = "healthCheck", default)]
    pub health_check: HealthCheckConfig,
    #[serde(rename = "circuitBreaker", default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(rename = "responseMapping", default)]
    pub response_mapping: ResponseMapping,
    #[serde(rename = "fileFormat", default)]
    pub file_format: Option<String>,
    #[serde(default)]
    pub queries: HashMap<String, String>,
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    #[serde(default)]
    pub topics: HashMap<String, String>,
    #[serde(rename = "keyPatterns", default)]
    pub key_patterns: HashMap<String, String>,
    #[serde(rename = "parameterNames", default)]
    pub parameter_names: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionMode {
    None,
    PerBatch,
    PerRecord,
    Global,
}

impl Default for TransactionMode {
    fn default() -> Self {
        TransactionMode::PerBatch
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchConfig {
    #[serde(rename = "maxBatchSize", default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(rename = "transactionMode", default)]
    pub transaction_mode: TransactionMode,
    #[serde(rename = "memoryThresholdPercent", default = "default_memory_threshold")]
    pub memory_threshold_percent: u8,
    #[serde(rename = "maxRetries", default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(rename = "retryDelayMs", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_batch_size() -> usize {
    500
}
fn default_memory_threshold() -> u8 {
    80
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSinkConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<SourceKind>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub implementation: Option<String>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(rename = "healthCheck", default)]
    pub health_check: HealthCheckConfig,
    #[serde(rename = "circuitBreaker", default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub operations: HashMap<String, String>,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(rename = "parameterNames", default)]
    pub parameter_names: Vec<String>,
}
