//! Pattern 1: conditional chaining (§4.6).

use crate::expr::{ExprEval, Value};
use crate::model::{ChainedEvaluationContext, RuleChain};
use crate::error::Result;

use super::config::{validate_conditional, ConditionalConfig};
use super::{evaluate_rule, run_rule_list, ChainResult, FailureAction};

pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    cfg: &ConditionalConfig,
    ctx: &mut ChainedEvaluationContext,
) -> Result<ChainResult> {
    validate_conditional(cfg)?;

    let (triggered, error) = evaluate_rule(eval, &cfg.trigger_rule, ctx);
    ctx.record_stage_result(format!("{}_result", cfg.trigger_rule.id), Value::Bool(triggered));

    let branch = if triggered { &cfg.on_trigger } else { &cfg.on_no_trigger };
    let outcome = if triggered { "TRIGGERED" } else { "NOT_TRIGGERED" };

    match run_rule_list(eval, branch, ctx, FailureAction::Continue) {
        Ok(()) => Ok(ChainResult::from_context(chain, ctx, outcome, true, error)),
        Err(message) => Ok(ChainResult::from_context(chain, ctx, outcome, false, Some(message))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
            id: "c1".into(),
            name: "conditional".into(),
            pattern: ChainPattern::ConditionalChaining,
            configuration: serde_yaml::Value::Null,
        }
    }

    fn context() -> ChainedEvaluationContext {
        ChainedEvaluationContext::new(
            HashMap::new(),
            ChainMetadata { id: "c1".into(), name: "conditional".into(), pattern: "conditional-chaining".into() },
        )
    }

    #[test]
    fn runs_on_trigger_branch_when_trigger_fires() {
        let eval = ExprEval::new();
        let cfg = ConditionalConfig {
            trigger_rule: rule("trigger", "true"),
            on_trigger: vec![rule("followUp", "true")],
            on_no_trigger: vec![rule("fallback", "true")],
        };
        let mut ctx = context();
        let result = execute(&eval, &chain(), &cfg, &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "TRIGGERED");
        assert!(ctx.stage_results.iter().any(|(k, _)| k == "followUp_result"));
        assert!(!ctx.stage_results.iter().any(|(k, _)| k == "fallback_result"));
    }

    #[test]
    fn runs_on_no_trigger_branch_when_trigger_does_not_fire() {
        let eval = ExprEval::new();
        let cfg = ConditionalConfig {
            trigger_rule: rule("trigger", "false"),
            on_trigger: vec![rule("followUp", "true")],
            on_no_trigger: vec![rule("fallback", "true")],
        };
        let mut ctx = context();
        let result = execute(&eval, &chain(), &cfg, &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "NOT_TRIGGERED");
        assert!(ctx.stage_results.iter().any(|(k, _)| k == "fallback_result"));
    }
}
