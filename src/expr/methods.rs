//! The fixed method-call safelist (§4.1: "limited to a fixed safelist").
//! No dynamic dispatch to host types beyond what's enumerated here.

use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;

use super::ast::Span;
use super::value::Value;
use crate::error::{ApexError, ExpressionErrorKind, Result};

lazy_static! {
    /// Compiled `matches()` patterns, shared across every evaluation since
    /// rule conditions re-use a small fixed set of patterns repeatedly.
    static ref REGEX_CACHE: DashMap<String, Arc<regex::Regex>> = DashMap::new();
}

fn compiled_regex(pattern: &str, span: Span) -> Result<Arc<regex::Regex>> {
    if let Some(cached) = REGEX_CACHE.get(pattern) {
        return Ok(cached.clone());
    }
    let compiled = regex::Regex::new(pattern).map_err(|e| {
        expr_err(ExpressionErrorKind::ParseError, format!("invalid regex in matches(): {e}"), span)
    })?;
    let compiled = Arc::new(compiled);
    REGEX_CACHE.insert(pattern.to_string(), compiled.clone());
    Ok(compiled)
}

fn expr_err(kind: ExpressionErrorKind, message: impl Into<String>, span: Span) -> ApexError {
    ApexError::Expression {
        kind,
        message: message.into(),
        span_start: span.start,
        span_end: span.end,
    }
}

pub fn call(method: &str, base: &Value, args: &[Value], span: Span) -> Result<Value> {
    match (method, base) {
        ("length", Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
        ("length", Value::List(l)) => Ok(Value::Int(l.len() as i64)),
        ("length", Value::Map(m)) => Ok(Value::Int(m.len() as i64)),
        ("isEmpty", Value::String(s)) => Ok(Value::Bool(s.is_empty())),
        ("isEmpty", Value::List(l)) => Ok(Value::Bool(l.is_empty())),
        ("toUpperCase", Value::String(s)) => Ok(Value::String(s.to_uppercase())),
        ("toLowerCase", Value::String(s)) => Ok(Value::String(s.to_lowercase())),
        ("trim", Value::String(s)) => Ok(Value::String(s.trim().to_string())),
        ("contains", Value::String(s)) => {
            let needle = string_arg(args, 0, span)?;
            Ok(Value::Bool(s.contains(&needle)))
        }
        ("startsWith", Value::String(s)) => {
            let needle = string_arg(args, 0, span)?;
            Ok(Value::Bool(s.starts_with(&needle)))
        }
        ("endsWith", Value::String(s)) => {
            let needle = string_arg(args, 0, span)?;
            Ok(Value::Bool(s.ends_with(&needle)))
        }
        ("matches", Value::String(s)) => {
            let pattern = string_arg(args, 0, span)?;
            let re = compiled_regex(&pattern, span)?;
            Ok(Value::Bool(re.is_match(s)))
        }
        ("compareTo", a) => {
            let b = args.first().ok_or_else(|| {
                expr_err(ExpressionErrorKind::TypeMismatch, "compareTo() requires one argument", span)
            })?;
            let ord = a.partial_compare(b).ok_or_else(|| {
                expr_err(ExpressionErrorKind::TypeMismatch, "compareTo() on incomparable types", span)
            })?;
            Ok(Value::Int(ord as i64))
        }
        ("plusYears", Value::String(date_str)) => shift_date(date_str, "years", args, span),
        ("plusMonths", Value::String(date_str)) => shift_date(date_str, "months", args, span),
        ("plusDays", Value::String(date_str)) => shift_date(date_str, "days", args, span),
        ("isAfter", Value::String(a)) => compare_dates(a, args, span, |o| o == std::cmp::Ordering::Greater),
        ("isBefore", Value::String(a)) => compare_dates(a, args, span, |o| o == std::cmp::Ordering::Less),
        (name, base) => Err(expr_err(
            ExpressionErrorKind::UnsafeOperation,
            format!("unsafe operation: method '{name}' is not allowed on {}", base.type_name()),
            span,
        )),
    }
}

fn string_arg(args: &[Value], idx: usize, span: Span) -> Result<String> {
    args.get(idx).and_then(Value::as_str).map(|s| s.to_string()).ok_or_else(|| {
        expr_err(ExpressionErrorKind::TypeMismatch, "expected a string argument", span)
    })
}

fn parse_date(s: &str, span: Span) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        expr_err(
            ExpressionErrorKind::TypeMismatch,
            format!("'{s}' is not a valid date (expected YYYY-MM-DD)"),
            span,
        )
    })
}

fn shift_date(date_str: &str, unit: &str, args: &[Value], span: Span) -> Result<Value> {
    let amount = args.first().and_then(Value::as_f64).ok_or_else(|| {
        expr_err(
            ExpressionErrorKind::TypeMismatch,
            format!("{unit} shift requires a numeric argument"),
            span,
        )
    })? as i64;
    let date = parse_date(date_str, span)?;
    let shifted = match unit {
        "years" => date.with_year(date.year() + amount as i32),
        "months" => {
            let total = date.year() * 12 + (date.month0() as i32) + amount as i32;
            let year = total.div_euclid(12);
            let month = total.rem_euclid(12) as u32 + 1;
            chrono::NaiveDate::from_ymd_opt(year, month, date.day())
        }
        _ => date.checked_add_signed(chrono::Duration::days(amount)),
    };
    let shifted = shifted.ok_or_else(|| {
        expr_err(ExpressionErrorKind::TypeMismatch, "date arithmetic out of range", span)
    })?;
    Ok(Value::String(shifted.format("%Y-%m-%d").to_string()))
}

fn compare_dates(
    a: &str,
    args: &[Value],
    span: Span,
    pred: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    let b = string_arg(args, 0, span)?;
    let da = parse_date(a, span)?;
    let db = parse_date(&b, span)?;
    Ok(Value::Bool(pred(da.cmp(&db))))
}

use chrono::Datelike;
