//! Layer 3: dependency analysis across an include graph built from
//! `data-source-refs` (§4.3 item 3, §8 "dependency-aware validation" and
//! "cycle detection" invariants).

use std::collections::{HashMap, HashSet};

use super::{validate_document, DocumentValidationResult};
use crate::model::Document;

pub struct LoadedFile {
    pub document: Document,
    pub is_yaml_ext: bool,
}

pub type FileValidationResult = DocumentValidationResult;

#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub dependencies: HashMap<String, Vec<String>>,
    pub circular_dependencies: Vec<Vec<String>>,
    pub root_causes: Vec<String>,
    pub file_results: HashMap<String, FileValidationResult>,
    pub is_valid: bool,
}

/// Runs per-document validation on every loaded file, then analyzes the
/// include graph rooted at `root`.
pub fn analyze(files: &HashMap<String, LoadedFile>, root: &str) -> DependencyReport {
    let dependencies: HashMap<String, Vec<String>> = files
        .iter()
        .map(|(path, loaded)| {
            let deps = loaded
                .document
                .data_source_refs
                .iter()
                .map(|r| r.source.clone())
                .collect();
            (path.clone(), deps)
        })
        .collect();

    let circular_dependencies = detect_cycles(&dependencies);

    let mut file_results: HashMap<String, FileValidationResult> = files
        .iter()
        .map(|(path, loaded)| (path.clone(), validate_document(&loaded.document, loaded.is_yaml_ext)))
        .collect();

    // Root causes: files with their own validation errors, or whose
    // dependency reference is broken/missing. Collected before propagation
    // so that propagated invalidity (on the referencing file) doesn't get
    // double-reported as its own root cause.
    let mut root_causes = Vec::new();
    for (path, result) in &file_results {
        for issue in result.errors() {
            root_causes.push(format!("{path}: {}", issue.message));
        }
    }
    for (path, deps) in &dependencies {
        for dep in deps {
            if !files.contains_key(dep) {
                root_causes.push(format!("{path}: missing dependency '{dep}'"));
            }
        }
    }
    root_causes.sort();

    // Fixed-point propagation: a file is invalid if it has its own errors
    // or any dependency is invalid or missing.
    let mut overall_valid: HashMap<String, bool> = files
        .keys()
        .map(|k| (k.clone(), file_results[k].valid))
        .collect();
    let mut changed = true;
    while changed {
        changed = false;
        for (path, deps) in &dependencies {
            let mut still_valid = overall_valid.get(path).copied().unwrap_or(true);
            if still_valid {
                for dep in deps {
                    let dep_valid = overall_valid.get(dep).copied().unwrap_or(false);
                    if !dep_valid {
                        still_valid = false;
                        break;
                    }
                }
            }
            if overall_valid.get(path) != Some(&still_valid) {
                overall_valid.insert(path.clone(), still_valid);
                changed = true;
            }
        }
    }

    for (path, result) in file_results.iter_mut() {
        result.valid = overall_valid.get(path).copied().unwrap_or(false);
    }

    let is_valid = overall_valid.get(root).copied().unwrap_or(false) && circular_dependencies.is_empty();

    DependencyReport {
        dependencies,
        circular_dependencies,
        root_causes,
        file_results,
        is_valid,
    }
}

/// Iterative DFS with a `visiting` set (§9: "never rely on unbounded
/// recursion"). On encountering a node already in `visiting`, the cycle
/// path is emitted.
fn detect_cycles(dependencies: &HashMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut globally_done: HashSet<String> = HashSet::new();

    for start in dependencies.keys() {
        if globally_done.contains(start) {
            continue;
        }
        let mut stack: Vec<(String, usize)> = vec![(start.clone(), 0)];
        let mut visiting: Vec<String> = Vec::new();
        let mut visiting_set: HashSet<String> = HashSet::new();

        while let Some((node, child_idx)) = stack.pop() {
            if child_idx == 0 {
                if visiting_set.contains(&node) {
                    continue;
                }
                visiting.push(node.clone());
                visiting_set.insert(node.clone());
            }

            let deps = dependencies.get(&node).cloned().unwrap_or_default();
            if let Some(next_dep) = deps.get(child_idx) {
                stack.push((node.clone(), child_idx + 1));
                if visiting_set.contains(next_dep) {
                    let cycle_start = visiting.iter().position(|n| n == next_dep).unwrap();
                    let mut cycle: Vec<String> = visiting[cycle_start..].to_vec();
                    cycle.push(next_dep.clone());
                    if !cycles.iter().any(|c: &Vec<String>| same_cycle(c, &cycle)) {
                        cycles.push(cycle);
                    }
                } else if !globally_done.contains(next_dep) {
                    stack.push((next_dep.clone(), 0));
                }
            } else {
                visiting.pop();
                visiting_set.remove(&node);
                globally_done.insert(node);
            }
        }
    }

    cycles
}

fn same_cycle(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let set_a: HashSet<&String> = a.iter().collect();
    b.iter().all(|n| set_a.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataSourceRef, DocumentType, Metadata};

    fn file(deps: &[&str], valid_metadata: bool) -> LoadedFile {
        let mut doc = Document {
            metadata: Some(Metadata {
                id: "x".into(),
                name: "x".into(),
                version: "1.0".into(),
                description: "d".into(),
                doc_type: DocumentType::RuleConfig,
                author: if valid_metadata { Some("a".into()) } else { None },
                ..Metadata::default()
            }),
            ..Document::default()
        };
        doc.rules.push(crate::model::Rule {
            id: "r1".into(),
            name: "r1".into(),
            condition: "true".into(),
            message: "m".into(),
            description: None,
            priority: 100,
            categories: Default::default(),
            created_date: chrono::Utc::now(),
            modified_date: chrono::Utc::now(),
            created_by_user: "t".into(),
            business_domain: None,
            business_owner: None,
            source_system: None,
            effective_date: None,
            expiration_date: None,
        });
        doc.data_source_refs = deps
            .iter()
            .map(|d| DataSourceRef {
                name: d.to_string(),
                source: d.to_string(),
                enabled: true,
                description: None,
            })
            .collect();
        LoadedFile { document: doc, is_yaml_ext: true }
    }

    #[test]
    fn dependency_happy_path() {
        let mut files = HashMap::new();
        files.insert("a.yaml".to_string(), file(&["b.yaml"], true));
        files.insert("b.yaml".to_string(), file(&[], true));
        let report = analyze(&files, "a.yaml");
        assert!(report.is_valid);
        assert!(report.circular_dependencies.is_empty());
        assert_eq!(report.dependencies["a.yaml"], vec!["b.yaml".to_string()]);
    }

    #[test]
    fn root_cause_reporting() {
        let mut files = HashMap::new();
        files.insert("a.yaml".to_string(), file(&["b.yaml"], true));
        files.insert("b.yaml".to_string(), file(&[], false));
        let report = analyze(&files, "a.yaml");
        assert!(!report.is_valid);
        assert!(report
            .root_causes
            .iter()
            .any(|c| c.starts_with("b.yaml") && c.contains("author")));
        assert!(!report.file_results["a.yaml"].valid);
    }

    #[test]
    fn cycle_is_detected() {
        let mut files = HashMap::new();
        files.insert("a.yaml".to_string(), file(&["b.yaml"], true));
        files.insert("b.yaml".to_string(), file(&["a.yaml"], true));
        let report = analyze(&files, "a.yaml");
        assert_eq!(report.circular_dependencies.len(), 1);
        assert!(!report.is_valid);
    }
}
