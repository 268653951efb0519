//! Loads configuration documents from disk, following `data-source-refs`
//! transitively into the shape the dependency analyzer expects (§4.2, §4.3
//! item 3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ApexError, Result};
use crate::model::Document;
use crate::validator::dependency::LoadedFile;

fn is_yaml_ext(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parses a single file's contents into a `Document`.
pub fn load_file(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ApexError::configuration(format!("reading '{}': {e}", path.display())))?;
    serde_yaml::from_str(&text)
        .map_err(|e| ApexError::configuration(format!("parsing '{}': {e}", path.display())))
}

/// Loads `root` and every file transitively reachable through its
/// `data-source-refs`, keyed by the path string used in `source`. Refs are
/// resolved relative to `root`'s parent directory.
///
/// A transitively-referenced file that is missing or fails to parse is
/// logged and left out of the returned map rather than aborting the whole
/// load — `analyze()` reports it as a missing dependency against whichever
/// file referenced it (§4.3 item 3), the same way it does for a file handed
/// to it directly. The root itself still fails hard: there is no report to
/// produce if the entry point can't be read at all.
pub fn load_transitive(root: &Path) -> Result<(String, HashMap<String, LoadedFile>)> {
    let root_key = root.to_string_lossy().to_string();
    let base_dir = root.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    let mut files: HashMap<String, LoadedFile> = HashMap::new();
    let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut pending = vec![root_key.clone()];

    while let Some(key) = pending.pop() {
        if !visited.insert(key.clone()) {
            continue;
        }
        let path = base_dir.join(&key);
        let resolved = if path.exists() { path } else { PathBuf::from(&key) };

        let document = match load_file(&resolved) {
            Ok(document) => document,
            Err(e) => {
                if key == root_key {
                    return Err(e);
                }
                warn!(file = %key, error = %e, "skipping unreadable transitive dependency");
                continue;
            }
        };

        for reference in &document.data_source_refs {
            if reference.enabled {
                pending.push(reference.source.clone());
            }
        }

        files.insert(
            key.clone(),
            LoadedFile { document, is_yaml_ext: is_yaml_ext(&resolved) },
        );
    }

    Ok((root_key, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_single_document_with_no_refs() {
        let dir = std::env::temp_dir().join(format!("apex-loader-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rules.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            "metadata:\n  id: r1\n  name: Rules\n  version: '1.0.0'\n  description: d\n  type: rule-config\n  author: me\nrules: []\n"
        )
        .unwrap();

        let (root_key, files) = load_transitive(&path).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key(&root_key));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_transitive_dependency_is_skipped_not_hard_errored() {
        let dir = std::env::temp_dir().join(format!("apex-loader-test-missing-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rules.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            "metadata:\n  id: r1\n  name: Rules\n  version: '1.0.0'\n  description: d\n  type: rule-config\n  author: me\nrules: []\ndata-source-refs:\n  - name: missing\n    source: does-not-exist.yaml\n    enabled: true\n"
        )
        .unwrap();

        let (root_key, files) = load_transitive(&path).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key(&root_key));
        assert!(!files.contains_key("does-not-exist.yaml"));

        let report = crate::validator::dependency::analyze(&files, &root_key);
        assert!(!report.is_valid);
        assert!(report
            .root_causes
            .iter()
            .any(|c| c.contains("missing dependency 'does-not-exist.yaml'")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_root_file_is_a_hard_error() {
        let path = PathBuf::from("/nonexistent/apex-loader-test/rules.yaml");
        assert!(load_transitive(&path).is_err());
    }
}
