//! Visitor-style evaluator over the expression AST (§4.1, §9 design note).

use std::collections::HashMap;

use super::ast::{BinaryOp, Expr, Span, UnaryOp};
use super::value::Value;
use crate::error::{ApexError, ExpressionErrorKind, Result};

/// The environment an expression evaluates against: the current record
/// (plain identifiers) plus named bindings (`#name` references), which
/// include prior stage/rule results threaded in by the rule-chain engine.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub record: HashMap<String, Value>,
    pub bindings: HashMap<String, Value>,
}

impl Environment {
    pub fn from_record(record: HashMap<String, Value>) -> Self {
        Environment {
            record,
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }
}

fn expr_err(kind: ExpressionErrorKind, message: impl Into<String>, span: Span) -> ApexError {
    ApexError::Expression {
        kind,
        message: message.into(),
        span_start: span.start,
        span_end: span.end,
    }
}

/// Evaluate a parsed expression against `env`. Expression evaluation never
/// performs I/O and never consults the clock — both §8 purity invariants
/// hold structurally, not by convention.
pub fn eval(expr: &Expr, env: &Environment) -> Result<Value> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Variable(name, span) => {
            if name.is_empty() {
                return root_as_map(env, *span);
            }
            env.bindings
                .get(name)
                .cloned()
                .or_else(|| env.record.get(name).cloned())
                .ok_or_else(|| {
                    expr_err(
                        ExpressionErrorKind::UnknownIdentifier,
                        format!("unknown identifier '#{name}'"),
                        *span,
                    )
                })
        }
        Expr::Identifier(name, span) => {
            // Missing fields evaluate to null rather than erroring (§4.1).
            let _ = span;
            Ok(env.record.get(name).cloned().unwrap_or(Value::Null))
        }
        Expr::FieldAccess { base, field, span } => {
            let base_val = eval(base, env)?;
            match base_val {
                Value::Map(m) => Ok(m.get(field).cloned().unwrap_or(Value::Null)),
                Value::Null => Ok(Value::Null),
                _ => Err(expr_err(
                    ExpressionErrorKind::TypeMismatch,
                    format!("cannot access field '{field}' of a {}", base_val.type_name()),
                    *span,
                )),
            }
        }
        Expr::Index { base, index, span } => {
            let base_val = eval(base, env)?;
            let index_val = eval(index, env)?;
            match (base_val, index_val) {
                (Value::Map(m), Value::String(k)) => Ok(m.get(&k).cloned().unwrap_or(Value::Null)),
                (Value::List(items), Value::Int(i)) => {
                    let idx = if i < 0 { None } else { usize::try_from(i).ok() };
                    Ok(idx
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or(Value::Null))
                }
                (Value::Null, _) => Ok(Value::Null),
                (base, index) => Err(expr_err(
                    ExpressionErrorKind::TypeMismatch,
                    format!(
                        "cannot index a {} with a {}",
                        base.type_name(),
                        index.type_name()
                    ),
                    *span,
                )),
            }
        }
        Expr::Unary { op, expr, span } => {
            let v = eval(expr, env)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                UnaryOp::Neg => match v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    Value::Null => Err(expr_err(
                        ExpressionErrorKind::NullDereference,
                        "null dereference in unary '-'",
                        *span,
                    )),
                    other => Err(expr_err(
                        ExpressionErrorKind::TypeMismatch,
                        format!("cannot negate a {}", other.type_name()),
                        *span,
                    )),
                },
            }
        }
        Expr::Binary { op, lhs, rhs, span } => eval_binary(*op, lhs, rhs, env, *span),
        Expr::Ternary {
            cond,
            when_true,
            when_false,
            ..
        } => {
            if eval(cond, env)?.truthy() {
                eval(when_true, env)
            } else {
                eval(when_false, env)
            }
        }
        Expr::MethodCall {
            base,
            method,
            args,
            span,
        } => {
            let base_val = eval(base, env)?;
            let arg_vals: Result<Vec<Value>> = args.iter().map(|a| eval(a, env)).collect();
            super::methods::call(method, &base_val, &arg_vals?, *span)
        }
    }
}

fn root_as_map(env: &Environment, span: Span) -> Result<Value> {
    if !env.bindings.is_empty() {
        return Err(expr_err(
            ExpressionErrorKind::UnsafeOperation,
            "bare '#' root reference is ambiguous with named bindings present",
            span,
        ));
    }
    Ok(Value::Map(env.record.clone()))
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    env: &Environment,
    span: Span,
) -> Result<Value> {
    // Logical operators short-circuit left to right (§4.1 semantics).
    match op {
        BinaryOp::And => {
            let l = eval(lhs, env)?;
            if !l.truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval(rhs, env)?.truthy()));
        }
        BinaryOp::Or => {
            let l = eval(lhs, env)?;
            if l.truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval(rhs, env)?.truthy()));
        }
        _ => {}
    }

    let l = eval(lhs, env)?;
    let r = eval(rhs, env)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = l.partial_compare(&r).ok_or_else(|| {
                expr_err(
                    ExpressionErrorKind::TypeMismatch,
                    format!(
                        "type mismatch comparing {} and {}",
                        l.type_name(),
                        r.type_name()
                    ),
                    span,
                )
            })?;
            use std::cmp::Ordering::*;
            let result = match (op, ordering) {
                (BinaryOp::Lt, Less) => true,
                (BinaryOp::Le, Less | Equal) => true,
                (BinaryOp::Gt, Greater) => true,
                (BinaryOp::Ge, Greater | Equal) => true,
                _ => false,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            eval_arithmetic(op, &l, &r, span)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}

/// Numeric promotion: int+int stays int; any float operand promotes the
/// result to float (spec's "decimal if either operand is decimal" collapses
/// to f64 promotion in this implementation — no decimal type is carried).
fn eval_arithmetic(op: BinaryOp, l: &Value, r: &Value, span: Span) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Err(expr_err(
            ExpressionErrorKind::NullDereference,
            "null dereference in arithmetic expression",
            span,
        ));
    }
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinaryOp::Add => Ok(Value::Int(a + b)),
            BinaryOp::Sub => Ok(Value::Int(a - b)),
            BinaryOp::Mul => Ok(Value::Int(a * b)),
            BinaryOp::Div => {
                if *b == 0 {
                    Err(expr_err(
                        ExpressionErrorKind::DivideByZero,
                        "division by zero",
                        span,
                    ))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            BinaryOp::Mod => {
                if *b == 0 {
                    Err(expr_err(
                        ExpressionErrorKind::DivideByZero,
                        "division by zero",
                        span,
                    ))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            _ => unreachable!(),
        },
        (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => {
            let x = a.as_f64().unwrap();
            let y = b.as_f64().unwrap();
            match op {
                BinaryOp::Add => Ok(Value::Float(x + y)),
                BinaryOp::Sub => Ok(Value::Float(x - y)),
                BinaryOp::Mul => Ok(Value::Float(x * y)),
                BinaryOp::Div => {
                    if y == 0.0 {
                        Err(expr_err(
                            ExpressionErrorKind::DivideByZero,
                            "division by zero",
                            span,
                        ))
                    } else {
                        Ok(Value::Float(x / y))
                    }
                }
                BinaryOp::Mod => Ok(Value::Float(x % y)),
                _ => unreachable!(),
            }
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::String(format!("{a}{b}")))
        }
        _ => Err(expr_err(
            ExpressionErrorKind::TypeMismatch,
            format!(
                "type mismatch in arithmetic: {} and {}",
                l.type_name(),
                r.type_name()
            ),
            span,
        )),
    }
}
