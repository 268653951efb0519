//! The `Enrichment` entity (§3, §4.5).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentType {
    LookupEnrichment,
    CalculationEnrichment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "sourceField")]
    pub source_field: String,
    #[serde(rename = "targetField")]
    pub target_field: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "defaultValue", default)]
    pub default_value: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(rename = "lookupService")]
    pub lookup_service: String,
    #[serde(rename = "lookupKey")]
    pub lookup_key: String,
    #[serde(default)]
    pub cache: bool,
    #[serde(rename = "cacheTtlSeconds", default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(rename = "fieldMappings")]
    pub field_mappings: Vec<FieldMapping>,
}

fn default_cache_ttl() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationConfig {
    pub expression: String,
    #[serde(rename = "resultField")]
    pub result_field: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
    pub id: String,
    #[serde(rename = "type")]
    pub enrichment_type: EnrichmentType,
    #[serde(rename = "targetType", default)]
    pub target_type: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub condition: String,
    #[serde(rename = "lookupConfig", default)]
    pub lookup_config: Option<LookupConfig>,
    #[serde(rename = "calculationConfig", default)]
    pub calculation_config: Option<CalculationConfig>,
}

impl Enrichment {
    pub fn applies_to(&self, record_type: Option<&str>) -> bool {
        match (&self.target_type, record_type) {
            (None, _) => true,
            (Some(t), Some(rt)) => t == rt,
            (Some(_), None) => false,
        }
    }
}
