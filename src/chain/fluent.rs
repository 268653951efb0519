//! Pattern 6: fluent builder tree (§4.6) — a depth-bounded (≤20) binary tree
//! rooted at `root-rule`; `on-success`/`on-failure` select the next node.

use crate::error::Result;
use crate::expr::{ExprEval, Value};
use crate::model::{ChainedEvaluationContext, RuleChain};

use super::config::{validate_fluent, FluentConfig, FluentNode, FLUENT_MAX_DEPTH};
use super::ChainResult;

pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    cfg: &FluentConfig,
    ctx: &mut ChainedEvaluationContext,
) -> Result<ChainResult> {
    validate_fluent(cfg)?;

    let mut node = &cfg.root_rule;
    let mut depth = 0;
    loop {
        depth += 1;
        if depth > FLUENT_MAX_DEPTH {
            return Ok(ChainResult::from_context(
                chain,
                ctx,
                "FAILURE",
                false,
                Some(format!("fluent-builder-tree exceeded max depth {FLUENT_MAX_DEPTH}")),
            ));
        }

        let env = ctx.environment();
        let (triggered, error) = match eval.evaluate_bool(&node.condition, &env) {
            Ok(t) => (t, None),
            Err(e) => (false, Some(e.to_string())),
        };
        ctx.record_stage_result(
            format!("fluent_rule_{}_result", node.name),
            Value::Bool(triggered),
        );

        let next: Option<&FluentNode> = if triggered {
            node.on_success.as_deref()
        } else {
            node.on_failure.as_deref()
        };

        match next {
            Some(child) => node = child,
            None => {
                let outcome = if triggered { "SUCCESS" } else { "FAILURE" };
                return Ok(ChainResult::from_context(chain, ctx, outcome, triggered, error));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChainMetadata, ChainPattern};
    use std::collections::HashMap;

    fn test_chain() -> RuleChain {
        RuleChain {
            id: "fluent1".into(),
            name: "fluent".into(),
            pattern: ChainPattern::FluentBuilderTree,
            configuration: serde_yaml::Value::Null,
        }
    }

    fn ctx() -> ChainedEvaluationContext {
        ChainedEvaluationContext::new(
            HashMap::new(),
            ChainMetadata { id: "fluent1".into(), name: "fluent".into(), pattern: "fluent-builder-tree".into() },
        )
    }

    #[test]
    fn follows_on_success_branch_to_leaf() {
        let eval = ExprEval::new();
        let root = FluentNode {
            name: "root".into(),
            condition: "true".into(),
            on_success: Some(Box::new(FluentNode {
                name: "leaf".into(),
                condition: "true".into(),
                on_success: None,
                on_failure: None,
            })),
            on_failure: None,
        };
        let cfg = FluentConfig { root_rule: root };
        let chain = test_chain();
        let mut context = ctx();

        let result = execute(&eval, &chain, &cfg, &mut context).unwrap();
        assert_eq!(result.final_outcome, "SUCCESS");
        assert!(result.successful);
        assert_eq!(result.stage_results.len(), 2);
    }

    #[test]
    fn follows_on_failure_branch_when_condition_is_false() {
        let eval = ExprEval::new();
        let root = FluentNode {
            name: "root".into(),
            condition: "false".into(),
            on_success: None,
            on_failure: Some(Box::new(FluentNode {
                name: "leaf".into(),
                condition: "false".into(),
                on_success: None,
                on_failure: None,
            })),
        };
        let cfg = FluentConfig { root_rule: root };
        let chain = test_chain();
        let mut context = ctx();

        let result = execute(&eval, &chain, &cfg, &mut context).unwrap();
        assert_eq!(result.final_outcome, "FAILURE");
        assert!(!result.successful);
    }
}
