//! The `Rule` entity (§3 "Rule") and `RuleGroup` container.
//!
//! Kept as a plain data struct plus a free evaluation function rather than
//! a recursive AND/OR/NOT condition tree, since APEX conditions are
//! ExprEval source strings, not a structured condition tree.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expr::{Environment, ExprEval};

fn default_priority() -> i32 {
    100
}

fn default_categories() -> HashSet<String> {
    let mut set = HashSet::new();
    set.insert("default".to_string());
    set
}

/// A single named condition with a user-facing message, per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub condition: String,
    pub message: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_categories")]
    pub categories: HashSet<String>,

    #[serde(rename = "createdDate")]
    pub created_date: DateTime<Utc>,
    #[serde(rename = "modifiedDate")]
    pub modified_date: DateTime<Utc>,
    #[serde(rename = "createdByUser")]
    pub created_by_user: String,
    #[serde(rename = "businessDomain")]
    pub business_domain: Option<String>,
    #[serde(rename = "businessOwner")]
    pub business_owner: Option<String>,
    #[serde(rename = "sourceSystem")]
    pub source_system: Option<String>,
    #[serde(rename = "effectiveDate")]
    pub effective_date: Option<DateTime<Utc>>,
    #[serde(rename = "expirationDate")]
    pub expiration_date: Option<DateTime<Utc>>,
}

/// Outcome of evaluating a single rule's condition.
#[derive(Debug, Clone)]
pub struct RuleEvaluationResult {
    pub rule_id: String,
    pub triggered: bool,
    pub error: Option<String>,
}

impl Rule {
    /// Audit-date invariant from §3: `createdDate <= modifiedDate <= now`.
    pub fn validate_audit_dates(&self) -> Result<()> {
        let now = Utc::now();
        if self.created_date > self.modified_date {
            return Err(crate::error::ApexError::configuration(format!(
                "rule '{}': createdDate must not be after modifiedDate",
                self.id
            )));
        }
        if self.modified_date > now {
            return Err(crate::error::ApexError::configuration(format!(
                "rule '{}': modifiedDate is in the future",
                self.id
            )));
        }
        Ok(())
    }

    /// Evaluates `condition` against `env`. A condition that errors counts
    /// as non-triggered rather than aborting the caller (§7 propagation
    /// rule: "a rule that errors counts as non-triggered").
    pub fn evaluate(&self, eval: &ExprEval, env: &Environment) -> RuleEvaluationResult {
        match eval.evaluate_bool(&self.condition, env) {
            Ok(triggered) => RuleEvaluationResult {
                rule_id: self.id.clone(),
                triggered,
                error: None,
            },
            Err(e) => RuleEvaluationResult {
                rule_id: self.id.clone(),
                triggered: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOperator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// A container over rules evaluated in priority order (§3 "RuleGroup"). AND
/// short-circuits on the first false result, OR on the first true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    pub operator: GroupOperator,
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn evaluate(&self, eval: &ExprEval, env: &Environment) -> RuleEvaluationResult {
        let mut ordered: Vec<&Rule> = self.rules.iter().collect();
        ordered.sort_by_key(|r| r.priority);

        match self.operator {
            GroupOperator::And => {
                for rule in ordered {
                    let result = rule.evaluate(eval, env);
                    if !result.triggered {
                        return RuleEvaluationResult {
                            rule_id: self.id.clone(),
                            triggered: false,
                            error: result.error,
                        };
                    }
                }
                RuleEvaluationResult {
                    rule_id: self.id.clone(),
                    triggered: true,
                    error: None,
                }
            }
            GroupOperator::Or => {
                for rule in ordered {
                    let result = rule.evaluate(eval, env);
                    if result.triggered {
                        return RuleEvaluationResult {
                            rule_id: self.id.clone(),
                            triggered: true,
                            error: None,
                        };
                    }
                }
                RuleEvaluationResult {
                    rule_id: self.id.clone(),
                    triggered: false,
                    error: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_rule(condition: &str) -> Rule {
        Rule {
            id: "r1".into(),
            name: "sample".into(),
            condition: condition.into(),
            message: "sample message".into(),
            description: None,
            priority: 100,
            categories: default_categories(),
            created_date: Utc::now(),
            modified_date: Utc::now(),
            created_by_user: "tester".into(),
            business_domain: None,
            business_owner: None,
            source_system: None,
            effective_date: None,
            expiration_date: None,
        }
    }

    #[test]
    fn rule_triggers_on_true_condition() {
        let eval = ExprEval::new();
        let rule = sample_rule("amount > 100");
        let mut record = HashMap::new();
        record.insert("amount".into(), crate::expr::Value::Int(500));
        let env = Environment::from_record(record);
        let result = rule.evaluate(&eval, &env);
        assert!(result.triggered);
        assert!(result.error.is_none());
    }

    #[test]
    fn erroring_condition_counts_as_non_triggered() {
        let eval = ExprEval::new();
        let rule = sample_rule("1 / 0 > 1");
        let env = Environment::default();
        let result = rule.evaluate(&eval, &env);
        assert!(!result.triggered);
        assert!(result.error.is_some());
    }

    #[test]
    fn and_group_short_circuits_on_first_false() {
        let eval = ExprEval::new();
        let mut record = HashMap::new();
        record.insert("amount".into(), crate::expr::Value::Int(5));
        let env = Environment::from_record(record);
        let group = RuleGroup {
            id: "g1".into(),
            operator: GroupOperator::And,
            rules: vec![sample_rule("amount > 100"), sample_rule("amount < 0")],
        };
        let result = group.evaluate(&eval, &env);
        assert!(!result.triggered);
    }

    #[test]
    fn audit_dates_must_be_ordered() {
        let mut rule = sample_rule("true");
        rule.created_date = Utc::now();
        rule.modified_date = rule.created_date - chrono::Duration::days(1);
        assert!(rule.validate_audit_dates().is_err());
    }
}
