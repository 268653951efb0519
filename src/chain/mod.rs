//! RuleChainEngine (§4.6): six composable orchestration patterns sharing a
//! rule-evaluation core and a uniform result shape.

pub mod accumulative;
pub mod conditional;
pub mod config;
pub mod fluent;
pub mod routing;
pub mod sequential;
pub mod workflow;

use crate::error::{ApexError, Result};
use crate::expr::{ExprEval, Value};
use crate::model::{ChainMetadata, ChainPattern, ChainedEvaluationContext, Rule, RuleChain};

/// `FailureAction` governs what a stage/sequential failure does to the rest
/// of the chain (§4.6 patterns 2 and 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    Terminate,
    Continue,
}

impl Default for FailureAction {
    fn default() -> Self {
        FailureAction::Continue
    }
}

/// Uniform result of one chain invocation (§4.6, §7 "structured result at
/// library boundary").
#[derive(Debug, Clone)]
pub struct ChainResult {
    pub rule_chain_id: String,
    pub rule_chain_name: String,
    pub pattern: ChainPattern,
    pub final_outcome: String,
    pub successful: bool,
    pub stage_results: Vec<(String, Value)>,
    pub error_message: Option<String>,
}

impl ChainResult {
    fn from_context(
        chain: &RuleChain,
        ctx: &ChainedEvaluationContext,
        final_outcome: impl Into<String>,
        successful: bool,
        error_message: Option<String>,
    ) -> Self {
        ChainResult {
            rule_chain_id: chain.id.clone(),
            rule_chain_name: chain.name.clone(),
            pattern: chain.pattern,
            final_outcome: final_outcome.into(),
            successful,
            stage_results: ctx.stage_results.clone(),
            error_message,
        }
    }
}

/// Evaluates `rule.condition` against the current context; an erroring
/// condition counts as "not triggered" but the error is returned so the
/// caller can decide whether to continue (§7).
pub fn evaluate_rule(
    eval: &ExprEval,
    rule: &Rule,
    ctx: &ChainedEvaluationContext,
) -> (bool, Option<String>) {
    let env = ctx.environment();
    match eval.evaluate_bool(&rule.condition, &env) {
        Ok(triggered) => (triggered, None),
        Err(e) => (false, Some(e.to_string())),
    }
}

/// Runs an ordered list of rules, recording `<name>_result` for each into
/// `stageResults`, honoring `failure_action` (pattern 2 / 5 shared logic).
/// Returns `Ok(())` if the list ran to completion, `Err` with the stopping
/// rule's id if a `terminate` failure action cut it short.
pub fn run_rule_list(
    eval: &ExprEval,
    rules: &[Rule],
    ctx: &mut ChainedEvaluationContext,
    failure_action: FailureAction,
) -> std::result::Result<(), String> {
    for rule in rules {
        let (triggered, error) = evaluate_rule(eval, rule, ctx);
        ctx.record_stage_result(format!("{}_result", rule.id), Value::Bool(triggered));
        if !triggered {
            if let Some(err) = error {
                if failure_action == FailureAction::Terminate {
                    return Err(err);
                }
            } else if failure_action == FailureAction::Terminate {
                return Err(format!("rule '{}' did not trigger", rule.id));
            }
        }
    }
    Ok(())
}

/// Dispatches to the pattern-specific executor selected by `chain.pattern`,
/// deserializing `chain.configuration` into that pattern's dedicated shape.
pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    record: std::collections::HashMap<String, Value>,
) -> Result<ChainResult> {
    let metadata = ChainMetadata {
        id: chain.id.clone(),
        name: chain.name.clone(),
        pattern: chain.pattern.as_str().to_string(),
    };
    let mut ctx = ChainedEvaluationContext::new(record, metadata);

    match chain.pattern {
        ChainPattern::ConditionalChaining => {
            let cfg: config::ConditionalConfig = parse_config(chain)?;
            conditional::execute(eval, chain, &cfg, &mut ctx)
        }
        ChainPattern::SequentialDependency => {
            let cfg: config::SequentialConfig = parse_config(chain)?;
            sequential::execute(eval, chain, &cfg, &mut ctx)
        }
        ChainPattern::ResultBasedRouting => {
            let cfg: config::RoutingConfig = parse_config(chain)?;
            routing::execute(eval, chain, &cfg, &mut ctx)
        }
        ChainPattern::AccumulativeChaining => {
            let cfg: config::AccumulativeConfig = parse_config(chain)?;
            accumulative::execute(eval, chain, &cfg, &mut ctx)
        }
        ChainPattern::ComplexWorkflow => {
            let cfg: config::WorkflowConfig = parse_config(chain)?;
            workflow::execute(eval, chain, &cfg, &mut ctx)
        }
        ChainPattern::FluentBuilderTree => {
            let cfg: config::FluentConfig = parse_config(chain)?;
            fluent::execute(eval, chain, &cfg, &mut ctx)
        }
    }
}

fn parse_config<T: serde::de::DeserializeOwned>(chain: &RuleChain) -> Result<T> {
    serde_yaml::from_value(chain.configuration.clone()).map_err(|e| {
        ApexError::configuration(format!(
            "rule-chain '{}' configuration does not match pattern '{}': {e}",
            chain.id,
            chain.pattern.as_str()
        ))
    })
}
