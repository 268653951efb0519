//! `ChainedEvaluationContext` (§3) — per-invocation mutable state threaded
//! through a rule-chain execution. Never shared across requests.

use std::collections::HashMap;

use crate::expr::{Environment, Value};

#[derive(Debug, Clone)]
pub struct ChainMetadata {
    pub id: String,
    pub name: String,
    pub pattern: String,
}

/// The execution context handed to every stage/rule within one chain
/// invocation. Owns the variable map (record fields + anything bound during
/// execution) and the ordered `stageResults`.
#[derive(Debug, Clone)]
pub struct ChainedEvaluationContext {
    pub variables: HashMap<String, Value>,
    pub stage_results: Vec<(String, Value)>,
    pub current_stage: String,
    pub metadata: ChainMetadata,
}

impl ChainedEvaluationContext {
    pub fn new(record: HashMap<String, Value>, metadata: ChainMetadata) -> Self {
        ChainedEvaluationContext {
            variables: record,
            stage_results: Vec::new(),
            current_stage: String::new(),
            metadata,
        }
    }

    /// Records a stage/rule result both as an addressable variable (via
    /// `#name`) and in the ordered `stageResults` list.
    pub fn record_stage_result(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.variables.insert(name.clone(), value.clone());
        self.stage_results.push((name, value));
    }

    /// Builds the [`Environment`] an expression evaluates against: the
    /// record fields plus every variable bound so far, addressable both as
    /// bare identifiers and as `#name` references.
    pub fn environment(&self) -> Environment {
        let mut env = Environment::from_record(self.variables.clone());
        for (k, v) in &self.variables {
            env.bind(k.clone(), v.clone());
        }
        env
    }

    pub fn stage_results_map(&self) -> HashMap<String, Value> {
        self.stage_results.iter().cloned().collect()
    }
}
