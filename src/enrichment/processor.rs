//! EnrichmentProcessor (§4.5): resolves lookups, merges fields, applies
//! defaults, and runs calculation enrichments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ApexError, Result};
use crate::expr::{Environment, ExprEval, Value};
use crate::model::{Enrichment, EnrichmentType};

use super::cache::LookupCache;

/// A keyed source of rows — implemented by a data source or an in-memory
/// provider (GLOSSARY "Lookup service"). `token` carries the caller's
/// cancellation signal down to whatever I/O the lookup performs (§5
/// "Cancellation").
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup(&self, key: &Value, token: &CancellationToken) -> Result<Option<HashMap<String, Value>>>;
}

/// A simple in-memory lookup table, useful for tests and small reference
/// datasets loaded straight from a `dataset` document.
pub struct InMemoryLookupService {
    rows: HashMap<String, HashMap<String, Value>>,
}

impl InMemoryLookupService {
    pub fn new(rows: HashMap<String, HashMap<String, Value>>) -> Self {
        InMemoryLookupService { rows }
    }
}

#[async_trait]
impl LookupService for InMemoryLookupService {
    async fn lookup(&self, key: &Value, token: &CancellationToken) -> Result<Option<HashMap<String, Value>>> {
        if token.is_cancelled() {
            return Err(ApexError::Cancelled);
        }
        Ok(self.rows.get(&key.to_string()).cloned())
    }
}

/// One field-level or enrichment-level failure surfaced back to the caller;
/// does not itself abort the enrichment pass (§4.5, §7 "required-field-
/// missing is a field-level error on the record").
#[derive(Debug, Clone)]
pub struct EnrichmentError {
    pub enrichment_id: String,
    pub message: String,
}

pub struct EnrichmentProcessor {
    eval: Arc<ExprEval>,
    services: HashMap<String, Arc<dyn LookupService>>,
    caches: std::sync::Mutex<HashMap<String, Arc<LookupCache>>>,
}

impl EnrichmentProcessor {
    pub fn new(eval: Arc<ExprEval>, services: HashMap<String, Arc<dyn LookupService>>) -> Self {
        EnrichmentProcessor {
            eval,
            services,
            caches: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn cache_for(&self, enrichment_id: &str, ttl_seconds: u64) -> Arc<LookupCache> {
        let mut caches = self.caches.lock().expect("enrichment cache map lock poisoned");
        caches
            .entry(enrichment_id.to_string())
            .or_insert_with(|| Arc::new(LookupCache::new(1024, ttl_seconds)))
            .clone()
    }

    /// Entry counts per enrichment's lookup cache, for admin introspection.
    pub fn cache_stats(&self) -> HashMap<String, usize> {
        self.caches
            .lock()
            .expect("enrichment cache map lock poisoned")
            .iter()
            .map(|(id, cache)| (id.clone(), cache.len()))
            .collect()
    }

    /// Runs every enabled, applicable, condition-satisfying enrichment
    /// (sorted by `priority` ascending, ties by declaration order) against
    /// `record`, mutating it in place and returning it (§4.5: "the return
    /// value must be the same object instance").
    pub async fn process<'a>(
        &self,
        record: &'a mut HashMap<String, Value>,
        enrichments: &[Enrichment],
        record_type: Option<&str>,
        token: &CancellationToken,
    ) -> (&'a mut HashMap<String, Value>, Vec<EnrichmentError>) {
        let mut ordered: Vec<&Enrichment> = enrichments.iter().collect();
        ordered.sort_by_key(|e| e.priority);

        let mut errors = Vec::new();
        for enrichment in ordered {
            if token.is_cancelled() {
                errors.push(EnrichmentError {
                    enrichment_id: enrichment.id.clone(),
                    message: ApexError::Cancelled.to_string(),
                });
                break;
            }
            if !enrichment.enabled || !enrichment.applies_to(record_type) {
                continue;
            }
            if !enrichment.condition.is_empty() {
                let env = Environment::from_record(record.clone());
                match self.eval.evaluate_bool(&enrichment.condition, &env) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        errors.push(EnrichmentError {
                            enrichment_id: enrichment.id.clone(),
                            message: e.to_string(),
                        });
                        continue;
                    }
                }
            }

            match enrichment.enrichment_type {
                EnrichmentType::LookupEnrichment => {
                    if let Err(e) = self.apply_lookup(enrichment, record, token).await {
                        errors.push(EnrichmentError {
                            enrichment_id: enrichment.id.clone(),
                            message: e.to_string(),
                        });
                    }
                }
                EnrichmentType::CalculationEnrichment => {
                    if let Err(e) = self.apply_calculation(enrichment, record) {
                        errors.push(EnrichmentError {
                            enrichment_id: enrichment.id.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        (record, errors)
    }

    async fn apply_lookup(
        &self,
        enrichment: &Enrichment,
        record: &mut HashMap<String, Value>,
        token: &CancellationToken,
    ) -> Result<()> {
        let config = enrichment
            .lookup_config
            .as_ref()
            .ok_or_else(|| ApexError::configuration("lookup-enrichment missing lookupConfig"))?;

        let service = self.services.get(&config.lookup_service).ok_or_else(|| {
            ApexError::Lookup(format!("lookup service '{}' not found", config.lookup_service))
        })?;

        let env = Environment::from_record(record.clone());
        let key = self.eval.evaluate(&config.lookup_key, &env)?;
        let key_str = key.to_string();

        let row = if config.cache {
            let cache = self.cache_for(&enrichment.id, config.cache_ttl_seconds);
            if let Some(cached) = cache.get(&key_str) {
                cached
            } else {
                let fetched = service.lookup(&key, token).await?;
                cache.put(key_str, fetched.clone());
                fetched
            }
        } else {
            service.lookup(&key, token).await?
        };

        for mapping in &config.field_mappings {
            let source_value = row.as_ref().and_then(|r| r.get(&mapping.source_field));
            match source_value {
                Some(v) => {
                    record.insert(mapping.target_field.clone(), v.clone());
                }
                None => {
                    if let Some(default) = &mapping.default_value {
                        record.insert(
                            mapping.target_field.clone(),
                            crate::expr::Value::from(yaml_to_json(default)),
                        );
                    } else if mapping.required {
                        return Err(ApexError::Lookup(format!(
                            "RequiredFieldMissing: '{}' for enrichment '{}'",
                            mapping.target_field, enrichment.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_calculation(
        &self,
        enrichment: &Enrichment,
        record: &mut HashMap<String, Value>,
    ) -> Result<()> {
        let config = enrichment
            .calculation_config
            .as_ref()
            .ok_or_else(|| ApexError::configuration("calculation-enrichment missing calculationConfig"))?;

        let env = Environment::from_record(record.clone());
        let value = self.eval.evaluate(&config.expression, &env)?;
        record.insert(config.result_field.clone(), value);
        Ok(())
    }
}

fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnrichmentType, FieldMapping, LookupConfig};

    fn counterparty_service() -> InMemoryLookupService {
        let mut rows = HashMap::new();
        let mut cpty001 = HashMap::new();
        cpty001.insert("name".to_string(), Value::String("Goldman Sachs".into()));
        cpty001.insert("rating".to_string(), Value::String("A+".into()));
        cpty001.insert("lei".to_string(), Value::String("W22LROWP2IHZNBB6K528".into()));
        cpty001.insert("jurisdiction".to_string(), Value::String("US".into()));
        rows.insert("CPTY001".to_string(), cpty001);
        InMemoryLookupService::new(rows)
    }

    fn counterparty_enrichment() -> Enrichment {
        Enrichment {
            id: "counterpartyLookup".into(),
            enrichment_type: EnrichmentType::LookupEnrichment,
            target_type: None,
            enabled: true,
            priority: 0,
            condition: String::new(),
            lookup_config: Some(LookupConfig {
                lookup_service: "counterpartyLookupService".into(),
                lookup_key: "counterpartyId".into(),
                cache: false,
                cache_ttl_seconds: 300,
                field_mappings: vec![
                    FieldMapping {
                        source_field: "name".into(),
                        target_field: "counterpartyName".into(),
                        required: false,
                        default_value: None,
                    },
                    FieldMapping {
                        source_field: "rating".into(),
                        target_field: "rating".into(),
                        required: false,
                        default_value: Some(serde_yaml::Value::String("NR".into())),
                    },
                    FieldMapping {
                        source_field: "lei".into(),
                        target_field: "lei".into(),
                        required: false,
                        default_value: None,
                    },
                    FieldMapping {
                        source_field: "jurisdiction".into(),
                        target_field: "jurisdiction".into(),
                        required: false,
                        default_value: Some(serde_yaml::Value::String("UNKNOWN".into())),
                    },
                ],
            }),
            calculation_config: None,
        }
    }

    #[tokio::test]
    async fn lookup_enrichment_merges_found_row() {
        let mut services: HashMap<String, Arc<dyn LookupService>> = HashMap::new();
        services.insert("counterpartyLookupService".into(), Arc::new(counterparty_service()));
        let processor = EnrichmentProcessor::new(Arc::new(ExprEval::new()), services);

        let mut record = HashMap::new();
        record.insert("counterpartyId".to_string(), Value::String("CPTY001".into()));
        let enrichments = vec![counterparty_enrichment()];

        let token = CancellationToken::new();
        let (record, errors) = processor.process(&mut record, &enrichments, None, &token).await;
        assert!(errors.is_empty());
        assert_eq!(record.get("counterpartyName"), Some(&Value::String("Goldman Sachs".into())));
        assert_eq!(record.get("rating"), Some(&Value::String("A+".into())));
    }

    #[tokio::test]
    async fn missing_key_falls_back_to_defaults() {
        let mut services: HashMap<String, Arc<dyn LookupService>> = HashMap::new();
        services.insert("counterpartyLookupService".into(), Arc::new(counterparty_service()));
        let processor = EnrichmentProcessor::new(Arc::new(ExprEval::new()), services);

        let mut record = HashMap::new();
        record.insert("counterpartyId".to_string(), Value::String("UNKNOWN".into()));
        let enrichments = vec![counterparty_enrichment()];

        let token = CancellationToken::new();
        let (record, errors) = processor.process(&mut record, &enrichments, None, &token).await;
        assert!(errors.is_empty());
        assert_eq!(record.get("rating"), Some(&Value::String("NR".into())));
        assert_eq!(record.get("jurisdiction"), Some(&Value::String("UNKNOWN".into())));
    }

    #[tokio::test]
    async fn enrichment_is_idempotent() {
        let mut services: HashMap<String, Arc<dyn LookupService>> = HashMap::new();
        services.insert("counterpartyLookupService".into(), Arc::new(counterparty_service()));
        let processor = EnrichmentProcessor::new(Arc::new(ExprEval::new()), services);

        let mut record = HashMap::new();
        record.insert("counterpartyId".to_string(), Value::String("CPTY001".into()));
        let enrichments = vec![counterparty_enrichment()];

        let token = CancellationToken::new();
        processor.process(&mut record, &enrichments, None, &token).await;
        let first = record.clone();
        processor.process(&mut record, &enrichments, None, &token).await;
        assert_eq!(record, first);
    }
}
