//! Pattern 2: sequential dependency (§4.6).

use crate::error::Result;
use crate::expr::ExprEval;
use crate::model::{ChainedEvaluationContext, RuleChain};

use super::config::{validate_sequential, SequentialConfig};
use super::{evaluate_rule, ChainResult, FailureAction};

pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    cfg: &SequentialConfig,
    ctx: &mut ChainedEvaluationContext,
) -> Result<ChainResult> {
    validate_sequential(cfg)?;

    for stage in &cfg.stages {
        let (triggered, error) = evaluate_rule(eval, &stage.rule, ctx);
        ctx.record_stage_result(stage.output_variable.clone(), triggered.into());

        if !triggered && stage.failure_action == FailureAction::Terminate {
            let message = error.unwrap_or_else(|| {
                format!("stage rule '{}' did not trigger", stage.rule.id)
            });
            return Ok(ChainResult::from_context(
                chain,
                ctx,
                "TERMINATED",
                false,
                Some(message),
            ));
        }
    }

    Ok(ChainResult::from_context(chain, ctx, "COMPLETED", true, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::config::SequentialStage;
    use crate::expr::Value;
    use crate::model::{ChainMetadata, ChainPattern, Rule};
    use std::collections::HashMap;

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

    fn chain() -> RuleChain {
        RuleChain {
            id: "s1".into(),
            name: "sequential".into(),
            pattern: ChainPattern::SequentialDependency,
            configuration: serde_yaml::Value::Null,
        }
    }

    fn context() -> ChainedEvaluationContext {
        ChainedEvaluationContext::new(
            HashMap::new(),
            ChainMetadata { id: "s1".into(), name: "sequential".into(), pattern: "sequential-dependency".into() },
        )
    }

    #[test]
    fn terminate_stops_remaining_stages() {
        let eval = ExprEval::new();
        let cfg = SequentialConfig {
            stages: vec![
                SequentialStage {
                    rule: rule("first", "false"),
                    output_variable: "firstResult".into(),
                    failure_action: FailureAction::Terminate,
                },
                SequentialStage {
                    rule: rule("second", "true"),
                    output_variable: "secondResult".into(),
                    failure_action: FailureAction::Continue,
                },
            ],
        };
        let mut ctx = context();
        let result = execute(&eval, &chain(), &cfg, &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "TERMINATED");
        assert!(!result.successful);
        assert!(!ctx.variables.contains_key("secondResult"));
    }

    #[test]
    fn continue_lets_later_stages_run() {
        let eval = ExprEval::new();
        let cfg = SequentialConfig {
            stages: vec![
                SequentialStage {
                    rule: rule("first", "false"),
                    output_variable: "firstResult".into(),
                    failure_action: FailureAction::Continue,
                },
                SequentialStage {
                    rule: rule("second", "true"),
                    output_variable: "secondResult".into(),
                    failure_action: FailureAction::Continue,
                },
            ],
        };
        let mut ctx = context();
        let result = execute(&eval, &chain(), &cfg, &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "COMPLETED");
        assert!(result.successful);
        assert_eq!(ctx.variables.get("secondResult"), Some(&Value::Bool(true)));
    }
}
