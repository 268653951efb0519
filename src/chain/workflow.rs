//! Pattern 5: complex workflow — a DAG of named stages (§4.6, §8 seed
//! scenario 3).

use std::collections::{HashMap, HashSet};

use crate::error::{ApexError, Result};
use crate::expr::{ExprEval, Value};
use crate::model::{ChainedEvaluationContext, RuleChain};

use super::config::{validate_workflow, WorkflowConfig, WorkflowStage};
use super::{evaluate_rule, ChainResult, FailureAction};

pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    cfg: &WorkflowConfig,
    ctx: &mut ChainedEvaluationContext,
) -> Result<ChainResult> {
    validate_workflow(cfg)?;

    let by_id: HashMap<&str, &WorkflowStage> =
        cfg.stages.iter().map(|s| (s.id.as_str(), s)).collect();
    let order = topological_order(&cfg.stages, &by_id)?;

    for stage_id in &order {
        let stage = by_id[stage_id.as_str()];
        let (triggered_count, total, failed) = run_stage(eval, stage, ctx);

        let label = if failed.is_some() {
            "PARTIAL_SUCCESS"
        } else if total == 0 || triggered_count == total {
            "SUCCESS"
        } else {
            "PARTIAL_SUCCESS"
        };
        ctx.record_stage_result(format!("stage_{stage_id}_result"), Value::String(label.into()));

        if let Some(message) = failed {
            return Ok(ChainResult::from_context(chain, ctx, "TERMINATED", false, Some(message)));
        }
    }

    Ok(ChainResult::from_context(chain, ctx, "COMPLETED", true, None))
}

/// Runs one stage's rules (direct or via `conditional-execution`), returning
/// `(triggered, total, terminate_error)`.
fn run_stage(
    eval: &ExprEval,
    stage: &WorkflowStage,
    ctx: &mut ChainedEvaluationContext,
) -> (usize, usize, Option<String>) {
    let (rules, output_value): (&[crate::model::Rule], Option<&str>) =
        if let Some(cond) = &stage.conditional_execution {
            let env = ctx.environment();
            match eval.evaluate_bool(&cond.condition, &env) {
                Ok(true) => (&cond.on_true.rules, cond.on_true.output_value.as_deref()),
                Ok(false) => (&cond.on_false.rules, cond.on_false.output_value.as_deref()),
                Err(e) => return (0, 0, Some(e.to_string())),
            }
        } else {
            (&stage.rules, None)
        };

    let mut triggered_count = 0;
    let mut terminate_error = None;
    for rule in rules {
        let (triggered, error) = evaluate_rule(eval, rule, ctx);
        ctx.record_stage_result(format!("{}_result", rule.id), Value::Bool(triggered));
        if triggered {
            triggered_count += 1;
        } else if stage.failure_action == FailureAction::Terminate {
            terminate_error = Some(error.unwrap_or_else(|| {
                format!("stage '{}' rule '{}' did not trigger", stage.id, rule.id)
            }));
            break;
        }
    }

    if let Some(output) = &stage.output_variable {
        let value = match output_value {
            Some(label) => Value::String(label.to_string()),
            None => Value::Bool(triggered_count == rules.len()),
        };
        ctx.record_stage_result(output.clone(), value);
    }

    (triggered_count, rules.len(), terminate_error)
}

/// Iterative DFS with a `visiting` set (§9: "never rely on unbounded
/// recursion"). Cycles raise a configuration error rather than infinite-loop.
fn topological_order(
    stages: &[WorkflowStage],
    by_id: &HashMap<&str, &WorkflowStage>,
) -> Result<Vec<String>> {
    let mut order = Vec::new();
    let mut done: HashSet<String> = HashSet::new();

    for start in stages {
        if done.contains(&start.id) {
            continue;
        }
        let mut stack: Vec<(String, usize)> = vec![(start.id.clone(), 0)];
        let mut visiting_order: Vec<String> = Vec::new();
        let mut visiting: HashSet<String> = HashSet::new();

        while let Some((node, child_idx)) = stack.pop() {
            if child_idx == 0 {
                if visiting.contains(&node) {
                    continue;
                }
                visiting_order.push(node.clone());
                visiting.insert(node.clone());
            }

            let deps = by_id
                .get(node.as_str())
                .map(|s| s.depends_on.clone())
                .unwrap_or_default();

            if let Some(next) = deps.get(child_idx) {
                stack.push((node.clone(), child_idx + 1));
                if visiting.contains(next) {
                    let cycle_start = visiting_order.iter().position(|n| n == next).unwrap();
                    let mut cycle = visiting_order[cycle_start..].to_vec();
                    cycle.push(next.clone());
                    return Err(ApexError::configuration(format!(
                        "complex-workflow stage dependency cycle: {}",
                        cycle.join(" -> ")
                    )));
                } else if !done.contains(next) {
                    stack.push((next.clone(), 0));
                }
            } else {
                visiting_order.pop();
                visiting.remove(&node);
                done.insert(node.clone());
                order.push(node);
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprEval;
    use crate::model::{ChainMetadata, ChainPattern, Rule};
    use std::collections::HashMap as Map;

    fn rule(id: &str, condition: &str) -> Rule {
        Rule {
            id: id.into(),
            name: id.into(),
            condition: condition.into(),
            message: "m".into(),
            description: None,
            priority: 100,
            categories: Default::default(),
            created_date: chrono::Utc::now(),
            modified_date: chrono::Utc::now(),
            created_by_user: "t".into(),
            business_domain: None,
            business_owner: None,
            source_system: None,
            effective_date: None,
            expiration_date: None,
        }
    }

    #[test]
    fn executes_stages_in_dependency_order() {
        let stages = vec![
            WorkflowStage {
                id: "approval".into(),
                depends_on: vec!["risk".into()],
                rules: vec![rule("approvalRule", "#riskLevel == 'HIGH'")],
                conditional_execution: None,
                output_variable: None,
                failure_action: FailureAction::Continue,
            },
            WorkflowStage {
                id: "risk".into(),
                depends_on: vec!["pre".into()],
                rules: vec![],
                conditional_execution: None,
                output_variable: Some("riskLevel".into()),
                failure_action: FailureAction::Continue,
            },
            WorkflowStage {
                id: "pre".into(),
                depends_on: vec![],
                rules: vec![rule("preRule", "notionalAmount > 0")],
                conditional_execution: None,
                output_variable: None,
                failure_action: FailureAction::Continue,
            },
        ];
        let by_id: HashMap<&str, &WorkflowStage> =
            stages.iter().map(|s| (s.id.as_str(), s)).collect();
        let order = topological_order(&stages, &by_id).unwrap();
        assert_eq!(order, vec!["pre".to_string(), "risk".to_string(), "approval".to_string()]);
    }

    #[tokio::test]
    async fn seed_scenario_three_topological_and_outcome() {
        let eval = ExprEval::new();
        let chain = RuleChain {
            id: "c1".into(),
            name: "workflow".into(),
            pattern: ChainPattern::ComplexWorkflow,
            configuration: serde_yaml::Value::Null,
        };
        let cfg = WorkflowConfig {
            stages: vec![
                WorkflowStage {
                    id: "pre".into(),
                    depends_on: vec![],
                    rules: vec![rule("preCheck", "tradeType == 'SWAP'")],
                    conditional_execution: None,
                    output_variable: None,
                    failure_action: FailureAction::Continue,
                },
                WorkflowStage {
                    id: "risk".into(),
                    depends_on: vec!["pre".into()],
                    rules: vec![],
                    conditional_execution: Some(super::super::config::ConditionalExecution {
                        condition: "notionalAmount > 1000000".into(),
                        on_true: super::super::config::ConditionalBranch {
                            rules: vec![rule("highRisk", "true")],
                            output_value: Some("HIGH".into()),
                        },
                        on_false: super::super::config::ConditionalBranch {
                            rules: vec![rule("lowRisk", "true")],
                            output_value: Some("LOW".into()),
                        },
                    }),
                    output_variable: Some("riskLevel".into()),
                    failure_action: FailureAction::Continue,
                },
                WorkflowStage {
                    id: "approval".into(),
                    depends_on: vec!["risk".into()],
                    rules: vec![rule("approvalRule", "true")],
                    conditional_execution: None,
                    output_variable: None,
                    failure_action: FailureAction::Continue,
                },
            ],
        };

        let mut record = Map::new();
        record.insert("tradeType".to_string(), Value::String("SWAP".into()));
        record.insert("notionalAmount".to_string(), Value::Int(5_000_000));
        let mut ctx = ChainedEvaluationContext::new(
            record,
            ChainMetadata { id: "c1".into(), name: "workflow".into(), pattern: "complex-workflow".into() },
        );

        let result = execute(&eval, &chain, &cfg, &mut ctx).unwrap();
        assert!(result.successful);
        assert_eq!(
            ctx.variables.get("riskLevel"),
            Some(&Value::String("HIGH".into()))
        );
        let approval = result
            .stage_results
            .iter()
            .find(|(k, _)| k == "stage_approval_result")
            .unwrap();
        assert_eq!(approval.1, Value::String("SUCCESS".into()));
    }
}
