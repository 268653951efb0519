//! The configuration document model (§3 "Document").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ApexError, Result};

use super::datasource::{DataSinkConfig, DataSourceConfig};
use super::enrichment::Enrichment;
use super::rule::{Rule, RuleGroup};
use super::rule_chain::RuleChain;

/// The set of document `type` values recognized by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    RuleConfig,
    Enrichment,
    Dataset,
    Scenario,
    ScenarioRegistry,
    Bootstrap,
    RuleChain,
    ExternalDataConfig,
    PipelineConfig,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::RuleConfig => "rule-config",
            DocumentType::Enrichment => "enrichment",
            DocumentType::Dataset => "dataset",
            DocumentType::Scenario => "scenario",
            DocumentType::ScenarioRegistry => "scenario-registry",
            DocumentType::Bootstrap => "bootstrap",
            DocumentType::RuleChain => "rule-chain",
            DocumentType::ExternalDataConfig => "external-data-config",
            DocumentType::PipelineConfig => "pipeline-config",
        }
    }

    /// Sections a document of this type is allowed to carry, used by the
    /// validator's recognized-section check (§4.2, §9 compile-time registry
    /// design note).
    pub fn recognized_sections(&self) -> &'static [&'static str] {
        match self {
            DocumentType::RuleConfig => &["rules", "rule-groups", "enrichments", "data-source-refs"],
            DocumentType::Enrichment => &["enrichments", "data-source-refs"],
            DocumentType::Dataset => &["data", "data-source-refs"],
            DocumentType::Scenario => &["scenario", "data-source-refs"],
            DocumentType::ScenarioRegistry => &["scenarios"],
            DocumentType::Bootstrap => &["bootstrap", "data-source-refs"],
            DocumentType::RuleChain => &["rule-chains", "data-source-refs"],
            DocumentType::ExternalDataConfig => &["data-sources", "data-sinks"],
            DocumentType::PipelineConfig => &["pipeline", "data-sources", "data-sinks"],
        }
    }

    /// At least one of these sections must be present (§4.3 item 1).
    pub fn required_sections(&self) -> &'static [&'static [&'static str]] {
        match self {
            DocumentType::RuleConfig => &[&["rules", "enrichments"]],
            DocumentType::PipelineConfig => &[&["pipeline", "data-sources", "data-sinks"]],
            _ => &[],
        }
    }
}

/// Metadata fields carried by every document, per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub author: Option<String>,
    #[serde(rename = "business-domain")]
    pub business_domain: Option<String>,
    pub owner: Option<String>,
    #[serde(rename = "created-by")]
    pub created_by: Option<String>,
    pub source: Option<String>,
}

impl Metadata {
    /// Checks the type-specific required-field rules from §3.
    pub fn validate_required_fields(&self) -> Result<()> {
        let missing = |field: &str| {
            ApexError::configuration(format!(
                "Missing required field for type '{}': {field}",
                self.doc_type.as_str()
            ))
        };
        match self.doc_type {
            DocumentType::RuleConfig | DocumentType::Enrichment | DocumentType::RuleChain => {
                if self.author.as_deref().unwrap_or("").is_empty() {
                    return Err(missing("author"));
                }
            }
            DocumentType::Scenario => {
                if self.business_domain.as_deref().unwrap_or("").is_empty() {
                    return Err(missing("business-domain"));
                }
                if self.owner.as_deref().unwrap_or("").is_empty() {
                    return Err(missing("owner"));
                }
            }
            DocumentType::ScenarioRegistry => {
                if self.created_by.as_deref().unwrap_or("").is_empty() {
                    return Err(missing("created-by"));
                }
            }
            DocumentType::Dataset => {
                if self.source.as_deref().unwrap_or("").is_empty() {
                    return Err(missing("source"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// A reference to a transitively-loaded configuration file (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceRef {
    pub name: String,
    pub source: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A fully parsed configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
    pub metadata: Option<Metadata>,
    #[serde(default, rename = "rules")]
    pub rules: Vec<Rule>,
    #[serde(default, rename = "rule-groups")]
    pub rule_groups: Vec<RuleGroup>,
    #[serde(default, rename = "enrichments")]
    pub enrichments: Vec<Enrichment>,
    #[serde(default, rename = "rule-chains")]
    pub rule_chains: Vec<RuleChain>,
    #[serde(default, rename = "data-source-refs")]
    pub data_source_refs: Vec<DataSourceRef>,
    #[serde(default, rename = "data-sources")]
    pub data_sources: Vec<DataSourceConfig>,
    #[serde(default, rename = "data-sinks")]
    pub data_sinks: Vec<DataSinkConfig>,
    /// Any remaining top-level keys, kept so the validator can report
    /// unrecognized sections without losing the raw document.
    #[serde(flatten)]
    pub raw_sections: HashMap<String, serde_yaml::Value>,
}

impl Document {
    pub fn top_level_section_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if !self.rules.is_empty() {
            names.push("rules".into());
        }
        if !self.rule_groups.is_empty() {
            names.push("rule-groups".into());
        }
        if !self.enrichments.is_empty() {
            names.push("enrichments".into());
        }
        if !self.rule_chains.is_empty() {
            names.push("rule-chains".into());
        }
        if !self.data_source_refs.is_empty() {
            names.push("data-source-refs".into());
        }
        if !self.data_sources.is_empty() {
            names.push("data-sources".into());
        }
        if !self.data_sinks.is_empty() {
            names.push("data-sinks".into());
        }
        names.extend(self.raw_sections.keys().cloned());
        names
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            id: String::new(),
            name: String::new(),
            version: "1.0.0".into(),
            description: String::new(),
            doc_type: DocumentType::RuleConfig,
            author: None,
            business_domain: None,
            owner: None,
            created_by: None,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_config_requires_author() {
        let mut metadata = Metadata {
            doc_type: DocumentType::RuleConfig,
            ..Metadata::default()
        };
        assert!(metadata.validate_required_fields().is_err());
        metadata.author = Some("jane.doe".into());
        assert!(metadata.validate_required_fields().is_ok());
    }

    #[test]
    fn recognized_sections_are_type_specific() {
        let sections = DocumentType::PipelineConfig.recognized_sections();
        assert!(sections.contains(&"pipeline"));
        assert!(!sections.contains(&"rule-groups"));
    }
}
