// APEX - Rust Edition
// A configuration-driven rules, enrichment and rule-chain engine.

//! # APEX
//!
//! APEX lets business users declare validation rules, enrichment lookups,
//! and multi-stage workflows in YAML; this crate compiles, validates, and
//! executes them against arbitrary record streams, attaching looked-up
//! data and computed fields in place.
//!
//! ## Module map
//!
//! - [`expr`] — the embedded expression language (`ExprEval`): parser,
//!   evaluator, method safelist, compilation cache.
//! - [`model`] — typed document entities: `Document`, `Rule`, `RuleChain`,
//!   `Enrichment`, data-source/sink configuration, `ChainedEvaluationContext`.
//! - [`validator`] — `GrammarValidator`: structural checks, expression-field
//!   awareness, and cross-file dependency/cycle analysis.
//! - [`pool`] — `DataSourcePool`/`RestDataSourcePool`/`DataSinkPool`: pooled
//!   SQL and REST connections unified behind `DataSourceBackend`, health
//!   checks, circuit breaker, error classification, cancellation, retries,
//!   batching.
//! - [`enrichment`] — `EnrichmentProcessor`: lookup and calculation
//!   enrichments with per-enrichment caching.
//! - [`chain`] — `RuleChainEngine`: the six rule-chain orchestration
//!   patterns and their shared scaffolding.
//! - [`registry`] — loads YAML documents, wires pools and lookup services,
//!   and hot-reloads configuration generations.
//! - [`observability`] — shared metrics primitives used across pools.
//! - [`config`] — process configuration (`AppConfig`).
//! - [`error`] — the crate-wide `ApexError` taxonomy.

pub mod chain;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod expr;
pub mod model;
pub mod observability;
pub mod pool;
pub mod registry;
pub mod validator;

pub use chain::ChainResult;
pub use config::AppConfig;
pub use enrichment::{EnrichmentProcessor, LookupService};
pub use error::{ApexError, Result};
pub use expr::{Environment, ExprEval, Value};
pub use model::{
    ChainPattern, ChainedEvaluationContext, DataSinkConfig, DataSourceConfig, Document,
    DocumentType, Enrichment, Rule, RuleChain,
};
pub use pool::{
    CircuitBreaker, DataSinkPool, DataSourceBackend, DataSourcePool, ErrorClass, HealthState,
    RestDataSourcePool,
};
pub use registry::{Generation, ServiceRegistry};
pub use validator::{validate_document, DocumentValidationResult};
