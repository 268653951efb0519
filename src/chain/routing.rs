//! Pattern 3: result-based routing (§4.6).

use crate::error::Result;
use crate::expr::ExprEval;
use crate::model::{ChainedEvaluationContext, RuleChain};

use super::config::{validate_routing, RoutingConfig, Route};
use super::{run_rule_list, ChainResult, FailureAction};

pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    cfg: &RoutingConfig,
    ctx: &mut ChainedEvaluationContext,
) -> Result<ChainResult> {
    validate_routing(cfg)?;

    let env = ctx.environment();
    let routed_value = match eval.evaluate(&cfg.router_rule.expression, &env) {
        Ok(v) => v,
        Err(e) => {
            return Ok(ChainResult::from_context(
                chain,
                ctx,
                "NO_MATCHING_ROUTE",
                false,
                Some(e.to_string()),
            ));
        }
    };
    let key = routed_value.to_string();
    ctx.record_stage_result(format!("{}_result", cfg.router_rule.id), routed_value);

    let selected: Option<&Route> = cfg.routes.get(&key).or(cfg.default_route.as_ref());

    let Some(route) = selected else {
        return Ok(ChainResult::from_context(
            chain,
            ctx,
            "NO_MATCHING_ROUTE",
            false,
            None,
        ));
    };

    match run_rule_list(eval, &route.rules, ctx, FailureAction::Continue) {
        Ok(()) => Ok(ChainResult::from_context(chain, ctx, key, true, None)),
        Err(message) => Ok(ChainResult::from_context(chain, ctx, key, false, Some(message))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::config::RouterRule;
    use crate::model::{ChainMetadata, ChainPattern};
    use std::collections::HashMap;

    fn chain() -> RuleChain {
        RuleChain {
            id: "r1".into(),
            name: "routing".into(),
            pattern: ChainPattern::ResultBasedRouting,
            configuration: serde_yaml::Value::Null,
        }
    }

    fn context_with(tier: &str) -> ChainedEvaluationContext {
        let mut record = HashMap::new();
        record.insert("tier".to_string(), crate::expr::Value::String(tier.into()));
        ChainedEvaluationContext::new(
            record,
            ChainMetadata { id: "r1".into(), name: "routing".into(), pattern: "result-based-routing".into() },
        )
    }

    fn config_with_routes() -> RoutingConfig {
        let mut routes = HashMap::new();
        routes.insert("GOLD".to_string(), Route { name: "GOLD".into(), rules: vec![] });
        RoutingConfig {
            router_rule: RouterRule { id: "router".into(), name: "router".into(), expression: "tier".into() },
            routes,
            default_route: Some(Route { name: "DEFAULT".into(), rules: vec![] }),
        }
    }

    #[test]
    fn matches_named_route() {
        let eval = ExprEval::new();
        let mut ctx = context_with("GOLD");
        let result = execute(&eval, &chain(), &config_with_routes(), &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "GOLD");
        assert!(result.successful);
    }

    #[test]
    fn falls_back_to_default_route_on_unknown_result() {
        let eval = ExprEval::new();
        let mut ctx = context_with("UNKNOWN_TIER");
        let result = execute(&eval, &chain(), &config_with_routes(), &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "UNKNOWN_TIER");
        assert!(result.successful);
    }

    #[test]
    fn reports_no_matching_route_without_default() {
        let eval = ExprEval::new();
        let mut cfg = config_with_routes();
        cfg.default_route = None;
        let mut ctx = context_with("UNKNOWN_TIER");
        let result = execute(&eval, &chain(), &cfg, &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "NO_MATCHING_ROUTE");
        assert!(!result.successful);
    }
}
