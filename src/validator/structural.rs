//! Layer 1: per-document structural validation (§4.3 item 1).

use super::{Severity, ValidationIssue};
use crate::model::Document;

pub fn validate(doc: &Document) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(metadata) = &doc.metadata else {
        issues.push(ValidationIssue::error("metadata", "missing required 'metadata' section"));
        return issues;
    };

    for (field, value) in [
        ("id", &metadata.id),
        ("name", &metadata.name),
        ("description", &metadata.description),
    ] {
        if value.trim().is_empty() {
            issues.push(ValidationIssue::error(
                format!("metadata.{field}"),
                format!("metadata.{field} must be a non-empty string"),
            ));
        }
    }

    if !is_semver_like(&metadata.version) {
        issues.push(ValidationIssue::error(
            "metadata.version",
            format!("'{}' is not a valid version (expected d+.d+(.d+)?)", metadata.version),
        ));
    }

    if let Err(e) = metadata.validate_required_fields() {
        issues.push(ValidationIssue::error("metadata", e.to_string()));
    }

    // Recognized-section check: every top-level section must be in the
    // type's compile-time-registered schema (§9 redesign: no reflection).
    let recognized = metadata.doc_type.recognized_sections();
    for section in doc.top_level_section_names() {
        if !recognized.contains(&section.as_str()) {
            issues.push(ValidationIssue::error(
                section.clone(),
                format!(
                    "unrecognized section '{section}' for document type '{}'",
                    metadata.doc_type.as_str()
                ),
            ));
        }
    }

    // Required-section check: at least one of each named alternative group
    // must be present.
    for group in metadata.doc_type.required_sections() {
        let present = doc.top_level_section_names();
        if !group.iter().any(|name| present.iter().any(|p| p == name)) {
            issues.push(ValidationIssue::error(
                "<document>",
                format!(
                    "document of type '{}' requires at least one of: {}",
                    metadata.doc_type.as_str(),
                    group.join(", ")
                ),
            ));
        }
    }

    for rule in &doc.rules {
        if rule.id.trim().is_empty() {
            issues.push(ValidationIssue::error("rules[].id", "rule id must be non-empty"));
        }
        if rule.condition.trim().is_empty() {
            issues.push(ValidationIssue::error(
                format!("rules[{}].condition", rule.id),
                "rule condition must be a non-empty expression",
            ));
        }
        if let Err(e) = rule.validate_audit_dates() {
            issues.push(ValidationIssue::error(format!("rules[{}]", rule.id), e.to_string()));
        }
    }

    let mut seen_ids = std::collections::HashSet::new();
    for rule in &doc.rules {
        if !seen_ids.insert(rule.id.clone()) {
            issues.push(ValidationIssue::error(
                format!("rules[{}]", rule.id),
                format!("duplicate rule id '{}'", rule.id),
            ));
        }
    }

    issues
}

fn is_semver_like(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return false;
    }
    parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentType, Metadata};

    #[test]
    fn missing_author_is_reported_for_rule_config() {
        let doc = Document {
            metadata: Some(Metadata {
                id: "a".into(),
                name: "a".into(),
                version: "1.0".into(),
                description: "d".into(),
                doc_type: DocumentType::RuleConfig,
                ..Metadata::default()
            }),
            ..Document::default()
        };
        let issues = validate(&doc);
        assert!(issues.iter().any(|i| i.message.contains("author")));
    }

    #[test]
    fn rule_config_without_rules_or_enrichments_fails_required_section() {
        let doc = Document {
            metadata: Some(Metadata {
                id: "a".into(),
                name: "a".into(),
                version: "1.0".into(),
                description: "d".into(),
                doc_type: DocumentType::RuleConfig,
                author: Some("jane".into()),
                ..Metadata::default()
            }),
            ..Document::default()
        };
        let issues = validate(&doc);
        assert!(issues
            .iter()
            .any(|i| i.message.contains("requires at least one of")));
    }
}
