//! GrammarValidator — structural, expression-awareness and dependency
//! validation over configuration documents (§4.3).

pub mod dependency;
pub mod expression_fields;
pub mod structural;

pub use dependency::{DependencyReport, FileValidationResult};

use crate::model::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl DocumentValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }
}

/// Runs the structural and expression-awareness layers against a single
/// already-parsed document. Dependency analysis operates across many files
/// and lives in [`dependency::analyze`].
pub fn validate_document(doc: &Document, file_extension_is_yaml: bool) -> DocumentValidationResult {
    let mut issues = Vec::new();
    issues.extend(structural::validate(doc));
    issues.extend(expression_fields::validate(doc));

    if !file_extension_is_yaml {
        issues.push(ValidationIssue::warning(
            "<file>",
            "file extension should be .yaml or .yml",
        ));
    }

    let valid = !issues.iter().any(|i| i.severity == Severity::Error);
    DocumentValidationResult { valid, issues }
}
