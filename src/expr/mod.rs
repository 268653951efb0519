//! ExprEval — the embedded expression language (§4.1).
//!
//! A small recursive-descent parser produces an [`ast::Expr`] tree;
//! evaluation walks it with a visitor over an [`eval::Environment`].
//! Compiled expressions are cached by source text in a bounded, thread-safe
//! LRU so hot conditions are parsed once.

pub mod ast;
pub mod cache;
pub mod eval;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod value;

pub use ast::{Expr, Span};
pub use eval::Environment;
pub use value::Value;

use cache::ExprCache;
use crate::error::Result;

/// Facade most callers reach for: compiles (with caching) and evaluates
/// expressions against an [`Environment`].
pub struct ExprEval {
    cache: ExprCache,
}

impl ExprEval {
    pub fn new() -> Self {
        ExprEval {
            cache: ExprCache::default(),
        }
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        ExprEval {
            cache: ExprCache::new(capacity),
        }
    }

    /// Parses (or retrieves from cache) and evaluates `source`.
    pub fn evaluate(&self, source: &str, env: &Environment) -> Result<Value> {
        let expr = self.cache.compile(source)?;
        eval::eval(&expr, env)
    }

    /// Convenience for condition fields: evaluates and coerces to a bool via
    /// [`Value::truthy`]. Errors propagate — the caller treats an erroring
    /// condition as non-triggered per §7.
    pub fn evaluate_bool(&self, source: &str, env: &Environment) -> Result<bool> {
        Ok(self.evaluate(source, env)?.truthy())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for ExprEval {
    fn default() -> Self {
        ExprEval::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(record: &[(&str, Value)]) -> Environment {
        let mut map = HashMap::new();
        for (k, v) in record {
            map.insert((*k).to_string(), v.clone());
        }
        Environment::from_record(map)
    }

    #[test]
    fn evaluates_arithmetic_with_numeric_promotion() {
        let eval = ExprEval::new();
        let env = Environment::default();
        assert_eq!(eval.evaluate("1 + 2 * 3", &env).unwrap(), Value::Int(7));
        assert_eq!(
            eval.evaluate("1 + 2.5", &env).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn missing_field_access_yields_null_not_error() {
        let eval = ExprEval::new();
        let env = env_with(&[("amount", Value::Int(5))]);
        assert_eq!(eval.evaluate("missingField", &env).unwrap(), Value::Null);
    }

    #[test]
    fn division_by_zero_is_reported() {
        let eval = ExprEval::new();
        let env = Environment::default();
        let err = eval.evaluate("1 / 0", &env).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn comparison_and_logical_composition() {
        let eval = ExprEval::new();
        let env = env_with(&[("notionalAmount", Value::Int(5_000_000))]);
        assert!(eval
            .evaluate_bool("notionalAmount > 1000000 && true", &env)
            .unwrap());
    }

    #[test]
    fn ternary_selects_branch() {
        let eval = ExprEval::new();
        let env = env_with(&[("notionalAmount", Value::Int(5_000_000))]);
        let result = eval
            .evaluate("notionalAmount > 1000000 ? 'HIGH' : 'LOW'", &env)
            .unwrap();
        assert_eq!(result, Value::String("HIGH".into()));
    }

    #[test]
    fn expression_purity_same_input_same_output() {
        let eval = ExprEval::new();
        let env = env_with(&[("x", Value::Int(3))]);
        let a = eval.evaluate("x * x + 1", &env).unwrap();
        let b = eval.evaluate("x * x + 1", &env).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn variable_reference_reads_bound_value() {
        let eval = ExprEval::new();
        let mut env = env_with(&[]);
        env.bind("riskLevel", Value::String("HIGH".into()));
        assert_eq!(
            eval.evaluate("#riskLevel == 'HIGH'", &env).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn method_safelist_rejects_unknown_method() {
        let eval = ExprEval::new();
        let env = env_with(&[("name", Value::String("abc".into()))]);
        let err = eval.evaluate("name.exec('rm -rf')", &env).unwrap_err();
        assert!(err.to_string().contains("unsafe operation"));
    }

    #[test]
    fn parse_error_carries_span() {
        let eval = ExprEval::new();
        let env = Environment::default();
        let err = eval.evaluate("1 + ", &env).unwrap_err();
        match err {
            crate::error::ApexError::Expression { span_start, span_end, .. } => {
                assert!(span_end >= span_start);
            }
            other => panic!("expected Expression error, got {other:?}"),
        }
    }
}
