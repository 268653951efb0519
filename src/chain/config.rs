//! Pattern-specific `configuration` shapes deserialized from a rule-chain's
//! raw YAML sub-tree (§4.6), plus their dedicated validators.

use serde::{Deserialize, Serialize};

use crate::error::{ApexError, Result};
use crate::model::Rule;

use super::FailureAction;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionalConfig {
    #[serde(rename = "trigger-rule")]
    pub trigger_rule: Rule,
    #[serde(rename = "on-trigger", default)]
    pub on_trigger: Vec<Rule>,
    #[serde(rename = "on-no-trigger", default)]
    pub on_no_trigger: Vec<Rule>,
}

pub fn validate_conditional(cfg: &ConditionalConfig) -> Result<()> {
    require_unique_ids(
        cfg.on_trigger.iter().chain(cfg.on_no_trigger.iter()),
        "conditional-chaining",
    )
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SequentialStage {
    pub rule: Rule,
    #[serde(rename = "output-variable")]
    pub output_variable: String,
    #[serde(rename = "failure-action", default)]
    pub failure_action: FailureAction,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SequentialConfig {
    pub stages: Vec<SequentialStage>,
}

pub fn validate_sequential(cfg: &SequentialConfig) -> Result<()> {
    if cfg.stages.is_empty() {
        return Err(ApexError::configuration(
            "sequential-dependency requires at least one stage",
        ));
    }
    require_unique_ids(cfg.stages.iter().map(|s| &s.rule), "sequential-dependency")
}

/// Unlike a gating `Rule`, a router rule's expression is evaluated for its
/// value (not coerced to bool) and stringified to pick a route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterRule {
    pub id: String,
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Route {
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(rename = "router-rule")]
    pub router_rule: RouterRule,
    pub routes: std::collections::HashMap<String, Route>,
    #[serde(rename = "default-route", default)]
    pub default_route: Option<Route>,
}

pub fn validate_routing(cfg: &RoutingConfig) -> Result<()> {
    if cfg.routes.is_empty() {
        return Err(ApexError::configuration(
            "result-based-routing requires at least one route",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccumulativeRule {
    pub id: String,
    pub name: String,
    #[serde(rename = "score-expression")]
    pub score_expression: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    pub outcome: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccumulativeConfig {
    pub rules: Vec<AccumulativeRule>,
    pub ranges: Vec<ScoreRange>,
}

pub fn validate_accumulative(cfg: &AccumulativeConfig) -> Result<()> {
    if cfg.rules.is_empty() {
        return Err(ApexError::configuration(
            "accumulative-chaining requires at least one rule",
        ));
    }
    if cfg.ranges.is_empty() {
        return Err(ApexError::configuration(
            "accumulative-chaining requires at least one outcome range",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for r in &cfg.rules {
        if !seen.insert(r.id.clone()) {
            return Err(ApexError::configuration(format!(
                "accumulative-chaining duplicate rule id '{}'",
                r.id
            )));
        }
    }
    Ok(())
}

/// One branch of a stage's `conditional-execution`: the rules it runs and
/// the label written into the stage's `output-variable` when taken.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionalBranch {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(rename = "output-value", default)]
    pub output_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionalExecution {
    pub condition: String,
    #[serde(rename = "on-true")]
    pub on_true: ConditionalBranch,
    #[serde(rename = "on-false")]
    pub on_false: ConditionalBranch,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowStage {
    pub id: String,
    #[serde(rename = "depends-on", default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(rename = "conditional-execution", default)]
    pub conditional_execution: Option<ConditionalExecution>,
    #[serde(rename = "output-variable", default)]
    pub output_variable: Option<String>,
    #[serde(rename = "failure-action", default)]
    pub failure_action: FailureAction,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    pub stages: Vec<WorkflowStage>,
}

pub fn validate_workflow(cfg: &WorkflowConfig) -> Result<()> {
    if cfg.stages.is_empty() {
        return Err(ApexError::configuration(
            "complex-workflow requires at least one stage",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for stage in &cfg.stages {
        if !seen.insert(stage.id.clone()) {
            return Err(ApexError::configuration(format!(
                "complex-workflow duplicate stage id '{}'",
                stage.id
            )));
        }
    }
    for stage in &cfg.stages {
        for dep in &stage.depends_on {
            if !seen.contains(dep) {
                return Err(ApexError::configuration(format!(
                    "complex-workflow stage '{}' depends-on unknown stage '{}'",
                    stage.id, dep
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FluentNode {
    pub name: String,
    pub condition: String,
    #[serde(rename = "on-success", default)]
    pub on_success: Option<Box<FluentNode>>,
    #[serde(rename = "on-failure", default)]
    pub on_failure: Option<Box<FluentNode>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FluentConfig {
    #[serde(rename = "root-rule")]
    pub root_rule: FluentNode,
}

pub const FLUENT_MAX_DEPTH: usize = 20;

pub fn validate_fluent(cfg: &FluentConfig) -> Result<()> {
    fn depth(node: &FluentNode) -> usize {
        let success_depth = node.on_success.as_deref().map(depth).unwrap_or(0);
        let failure_depth = node.on_failure.as_deref().map(depth).unwrap_or(0);
        1 + success_depth.max(failure_depth)
    }
    if depth(&cfg.root_rule) > FLUENT_MAX_DEPTH {
        return Err(ApexError::configuration(format!(
            "fluent-builder-tree exceeds max depth {FLUENT_MAX_DEPTH}"
        )));
    }
    Ok(())
}

fn require_unique_ids<'a, I: Iterator<Item = &'a Rule>>(rules: I, pattern: &str) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.clone()) {
            return Err(ApexError::configuration(format!(
                "{pattern} duplicate rule id '{}'",
                rule.id
            )));
        }
    }
    Ok(())
}
