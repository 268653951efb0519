//! YamlModel — typed document entities (§3, §4.2).

pub mod context;
pub mod datasource;
pub mod document;
pub mod enrichment;
pub mod rule;
pub mod rule_chain;

pub use context::{ChainMetadata, ChainedEvaluationContext};
pub use datasource::{DataSinkConfig, DataSourceConfig};
pub use document::{DataSourceRef, Document, DocumentType, Metadata};
pub use enrichment::{CalculationConfig, Enrichment, EnrichmentType, FieldMapping, LookupConfig};
pub use rule::{GroupOperator, Rule, RuleEvaluationResult, RuleGroup};
pub use rule_chain::{ChainPattern, RuleChain};
