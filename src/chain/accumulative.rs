//! Pattern 4: accumulative chaining (§4.6).

use crate::error::{ApexError, Result};
use crate::expr::{ExprEval, Value};
use crate::model::{ChainedEvaluationContext, RuleChain};

use super::config::{validate_accumulative, AccumulativeConfig};
use super::ChainResult;

pub fn execute(
    eval: &ExprEval,
    chain: &RuleChain,
    cfg: &AccumulativeConfig,
    ctx: &mut ChainedEvaluationContext,
) -> Result<ChainResult> {
    validate_accumulative(cfg)?;

    let mut accumulator = 0.0_f64;
    for rule in &cfg.rules {
        let env = ctx.environment();
        let score = match eval.evaluate(&rule.score_expression, &env) {
            Ok(v) => v.as_f64().unwrap_or(0.0),
            Err(e) => {
                return Ok(ChainResult::from_context(
                    chain,
                    ctx,
                    "ERROR",
                    false,
                    Some(e.to_string()),
                ));
            }
        };
        accumulator += score;
        ctx.record_stage_result(format!("{}_score", rule.id), Value::Float(score));
    }
    ctx.record_stage_result("accumulatedScore", Value::Float(accumulator));

    let outcome = cfg
        .ranges
        .iter()
        .find(|r| accumulator >= r.min && accumulator <= r.max)
        .map(|r| r.outcome.clone())
        .ok_or_else(|| {
            ApexError::configuration(format!(
                "accumulative-chaining score {accumulator} matched no range in chain '{}'",
                chain.id
            ))
        })?;

    Ok(ChainResult::from_context(chain, ctx, outcome, true, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::config::{AccumulativeRule, ScoreRange};
    use crate::model::{ChainMetadata, ChainPattern};
    use std::collections::HashMap;

    fn chain() -> RuleChain {
        RuleChain {
            id: "acc1".into(),
            name: "accumulative".into(),
            pattern: ChainPattern::AccumulativeChaining,
            configuration: serde_yaml::Value::Null,
        }
    }

    fn context() -> ChainedEvaluationContext {
        let mut record = HashMap::new();
        record.insert("notionalAmount".to_string(), Value::Int(5_000_000));
        ChainedEvaluationContext::new(
            record,
            ChainMetadata { id: "acc1".into(), name: "accumulative".into(), pattern: "accumulative-chaining".into() },
        )
    }

    #[test]
    fn accumulates_scores_and_picks_matching_range() {
        let eval = ExprEval::new();
        let cfg = AccumulativeConfig {
            rules: vec![
                AccumulativeRule { id: "size".into(), name: "size".into(), score_expression: "notionalAmount > 1000000 ? 50 : 0".into() },
                AccumulativeRule { id: "base".into(), name: "base".into(), score_expression: "10".into() },
            ],
            ranges: vec![
                ScoreRange { min: 0.0, max: 30.0, outcome: "LOW".into() },
                ScoreRange { min: 30.0, max: 70.0, outcome: "MEDIUM".into() },
                ScoreRange { min: 70.0, max: 1000.0, outcome: "HIGH".into() },
            ],
        };
        let mut ctx = context();
        let result = execute(&eval, &chain(), &cfg, &mut ctx).unwrap();
        assert_eq!(result.final_outcome, "MEDIUM");
        assert_eq!(ctx.variables.get("accumulatedScore"), Some(&Value::Float(60.0)));
    }
}
