//! Layer 2: expression field awareness (§4.3 item 2). A field is only
//! parse-checked as an expression when its path ends in one of the
//! expression-bearing names; everything else (message, description, name,
//! id, author, …) is plain text even if it happens to contain `#`.

use super::{Severity, ValidationIssue};
use crate::expr::parser;
use crate::model::Document;

fn check(path: String, source: &str, issues: &mut Vec<ValidationIssue>) {
    if source.trim().is_empty() {
        return;
    }
    if let Err(e) = parser::parse(source) {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            path,
            message: format!("invalid expression: {e}"),
        });
    }
}

pub fn validate(doc: &Document) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for rule in &doc.rules {
        check(format!("rules[{}].condition", rule.id), &rule.condition, &mut issues);
    }

    for enrichment in &doc.enrichments {
        if !enrichment.condition.is_empty() {
            check(
                format!("enrichments[{}].condition", enrichment.id),
                &enrichment.condition,
                &mut issues,
            );
        }
        if let Some(lookup) = &enrichment.lookup_config {
            check(
                format!("enrichments[{}].lookupConfig.lookupKey", enrichment.id),
                &lookup.lookup_key,
                &mut issues,
            );
        }
        if let Some(calc) = &enrichment.calculation_config {
            check(
                format!("enrichments[{}].calculationConfig.expression", enrichment.id),
                &calc.expression,
                &mut issues,
            );
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Enrichment, EnrichmentType, LookupConfig};

    #[test]
    fn plain_text_fields_are_never_parsed_as_expressions() {
        // `message` containing '#' must not be flagged; it isn't inspected
        // by this layer at all.
        let doc = Document::default();
        assert!(validate(&doc).is_empty());
    }

    #[test]
    fn broken_lookup_key_is_reported_with_path() {
        let mut doc = Document::default();
        doc.enrichments.push(Enrichment {
            id: "e1".into(),
            enrichment_type: EnrichmentType::LookupEnrichment,
            target_type: None,
            enabled: true,
            priority: 0,
            condition: String::new(),
            lookup_config: Some(LookupConfig {
                lookup_service: "svc".into(),
                lookup_key: "counterpartyId +".into(),
                cache: false,
                cache_ttl_seconds: 300,
                field_mappings: vec![],
            }),
            calculation_config: None,
        });
        let issues = validate(&doc);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.contains("lookupKey"));
    }
}
