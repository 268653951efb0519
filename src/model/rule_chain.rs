//! The `RuleChain` entity (§3, §4.6). The pattern-specific `configuration`
//! sub-tree is kept as raw YAML here; `crate::chain` deserializes it into
//! the pattern's dedicated configuration struct when building an executor,
//! so this model stays agnostic of the six pattern shapes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainPattern {
    ConditionalChaining,
    SequentialDependency,
    ResultBasedRouting,
    AccumulativeChaining,
    ComplexWorkflow,
    FluentBuilderTree,
}

impl ChainPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainPattern::ConditionalChaining => "conditional-chaining",
            ChainPattern::SequentialDependency => "sequential-dependency",
            ChainPattern::ResultBasedRouting => "result-based-routing",
            ChainPattern::AccumulativeChaining => "accumulative-chaining",
            ChainPattern::ComplexWorkflow => "complex-workflow",
            ChainPattern::FluentBuilderTree => "fluent-builder-tree",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleChain {
    pub id: String,
    pub name: String,
    pub pattern: ChainPattern,
    pub configuration: serde_yaml::Value,
}
