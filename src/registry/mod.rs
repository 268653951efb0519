//! ServiceRegistry & Loader (§2): loads YAML documents, validates them,
//! builds data source/sink pools and lookup services, and wires everything
//! an engine run needs. Re-loading produces a new generation that
//! atomically replaces the prior one (§3 "Lifecycle").

pub mod loader;
pub mod lookup;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chain::ChainResult;
use crate::enrichment::{EnrichmentProcessor, LookupService};
use crate::error::{ApexError, Result};
use crate::expr::{Environment, ExprEval, Value};
use crate::model::{ConnectionConfig, Enrichment, Rule, RuleChain, RuleGroup, SourceKind};
use crate::pool::{DataSinkPool, DataSourceBackend, RestDataSourcePool};
use crate::pool::DataSourcePool;
use crate::validator::dependency::{analyze, LoadedFile};

use lookup::DataSourceLookupService;

/// Builds a Postgres connection string from the sparse fields a document's
/// `connection` block carries. The model has no literal URL/password
/// fields (§3), so credentials are expected via the standard `PGPASSWORD`
/// / libpq environment conventions; only host/port/database/user are
/// taken from configuration.
pub fn connection_url(conn: &ConnectionConfig) -> String {
    let host = conn.host.as_deref().unwrap_or("localhost");
    let port = conn.port.unwrap_or(5432);
    let database = conn.database.as_deref().unwrap_or("apex");
    match &conn.username {
        Some(user) => format!("postgres://{user}@{host}:{port}/{database}"),
        None => format!("postgres://{host}:{port}/{database}"),
    }
}

/// One loaded, validated, wired generation of configuration (§3
/// "Lifecycle" — distinct generations never share mutable state).
pub struct Generation {
    pub rules: HashMap<String, Rule>,
    pub rule_groups: HashMap<String, RuleGroup>,
    pub rule_chains: HashMap<String, RuleChain>,
    pub enrichments: HashMap<String, Enrichment>,
    pub data_sources: HashMap<String, Arc<DataSourceBackend>>,
    pub data_sinks: HashMap<String, Arc<DataSinkPool>>,
    pub processor: EnrichmentProcessor,
    pub eval: Arc<ExprEval>,
}

impl Generation {
    /// Evaluates `record` through the named rule chain (§4.6).
    pub fn evaluate_chain(&self, chain_id: &str, record: HashMap<String, Value>) -> Result<ChainResult> {
        let chain = self
            .rule_chains
            .get(chain_id)
            .ok_or_else(|| ApexError::configuration(format!("unknown rule chain '{chain_id}'")))?;
        crate::chain::execute(&self.eval, chain, record)
    }

    /// Evaluates a named `RuleGroup` against `record` (§3 "RuleGroup").
    pub fn evaluate_rule_group(
        &self,
        group_id: &str,
        record: &HashMap<String, Value>,
    ) -> Result<crate::model::RuleEvaluationResult> {
        let group = self
            .rule_groups
            .get(group_id)
            .ok_or_else(|| ApexError::configuration(format!("unknown rule group '{group_id}'")))?;
        let env = Environment::from_record(record.clone());
        Ok(group.evaluate(&self.eval, &env))
    }

    /// Runs the enrichment pipeline over `record` (§4.5). Returns any
    /// per-enrichment errors collected along the way; the record is still
    /// mutated in place for enrichments that did succeed. `token` carries
    /// the caller's cancellation signal into every lookup performed (§5).
    pub async fn enrich<'a>(
        &self,
        record: &'a mut HashMap<String, Value>,
        record_type: Option<&str>,
        token: &CancellationToken,
    ) -> (&'a mut HashMap<String, Value>, Vec<crate::enrichment::EnrichmentError>) {
        let enrichments: Vec<Enrichment> = self.enrichments.values().cloned().collect();
        self.processor.process(record, &enrichments, record_type, token).await
    }

    /// Enriches `record` and then evaluates it through `chain_id` (§4.5 +
    /// §4.6 end to end). A cancellation observed during enrichment aborts
    /// before the chain runs rather than evaluating a half-enriched record.
    pub async fn process_request(
        &self,
        chain_id: &str,
        mut record: HashMap<String, Value>,
        record_type: Option<&str>,
        token: &CancellationToken,
    ) -> Result<ChainResult> {
        let (_, enrichment_errors) = self.enrich(&mut record, record_type, token).await;
        if token.is_cancelled() {
            return Err(ApexError::Cancelled);
        }
        for err in &enrichment_errors {
            warn!(enrichment_id = %err.enrichment_id, message = %err.message, "enrichment error during process_request");
        }
        self.evaluate_chain(chain_id, record)
    }
}

/// Connects one configured data source to whichever backend its `type`
/// (`SourceKind`) names (§4.4, §6 "Data-source wire contracts"). Kinds with
/// no concrete wire contract in this build are logged and skipped rather
/// than silently treated as a database.
async fn connect_source(config: &crate::model::DataSourceConfig) -> Result<Option<Arc<DataSourceBackend>>> {
    match config.kind.unwrap_or(SourceKind::Database) {
        SourceKind::Database => {
            let url = connection_url(&config.connection);
            let pool = DataSourcePool::connect(config.clone(), &url).await?;
            Ok(Some(Arc::new(DataSourceBackend::Database(Arc::new(pool)))))
        }
        SourceKind::RestApi => {
            let pool = RestDataSourcePool::connect(config.clone()).await?;
            Ok(Some(Arc::new(DataSourceBackend::Rest(Arc::new(pool)))))
        }
        other => {
            warn!(source = %config.name, kind = ?other, "data source kind has no wire contract in this build, skipping");
            Ok(None)
        }
    }
}

/// Builds pools/services for every `data-sources`/`data-sinks` entry found
/// across the loaded document set, and lookup services for any data source
/// whose name is referenced by an enrichment's `lookupService`. Independent
/// sources/sinks connect concurrently since each dials out over its own
/// network connection (§5 "Concurrency & Resource Model").
async fn build_pools(
    documents: &HashMap<String, LoadedFile>,
) -> Result<(
    HashMap<String, Arc<DataSourceBackend>>,
    HashMap<String, Arc<DataSinkPool>>,
    HashMap<String, Arc<dyn LookupService>>,
)> {
    let mut source_configs = Vec::new();
    let mut sink_configs = Vec::new();
    for loaded in documents.values() {
        for config in &loaded.document.data_sources {
            if config.enabled {
                source_configs.push(config.clone());
            }
        }
        for config in &loaded.document.data_sinks {
            if config.enabled {
                sink_configs.push(config.clone());
            }
        }
    }

    let connected_sources = try_join_all(source_configs.iter().map(|config| async move {
        connect_source(config).await.map(|backend| (config.name.clone(), backend))
    }))
    .await?;

    let connected_sinks = try_join_all(sink_configs.iter().map(|config| async move {
        if config.kind.unwrap_or(SourceKind::Database) != SourceKind::Database {
            warn!(sink = %config.name, "data sink kind has no wire contract in this build, skipping");
            return Result::Ok((config.name.clone(), None));
        }
        let url = connection_url(&config.connection);
        let pool = Arc::new(DataSinkPool::connect(config.clone(), &url).await?);
        Result::Ok((config.name.clone(), Some(pool)))
    }))
    .await?;

    let mut sources = HashMap::new();
    let mut lookup_services: HashMap<String, Arc<dyn LookupService>> = HashMap::new();
    for (name, backend) in connected_sources {
        if let Some(backend) = backend {
            lookup_services.insert(name.clone(), Arc::new(DataSourceLookupService::new(backend.clone())));
            sources.insert(name, backend);
        }
    }

    let mut sinks = HashMap::new();
    for (name, pool) in connected_sinks {
        if let Some(pool) = pool {
            sinks.insert(name, pool);
        }
    }

    Ok((sources, sinks, lookup_services))
}

#[allow(clippy::type_complexity)]
fn collect_entities(
    documents: &HashMap<String, LoadedFile>,
) -> (
    HashMap<String, Rule>,
    HashMap<String, RuleGroup>,
    HashMap<String, RuleChain>,
    HashMap<String, Enrichment>,
) {
    let mut rules = HashMap::new();
    let mut rule_groups = HashMap::new();
    let mut rule_chains = HashMap::new();
    let mut enrichments = HashMap::new();

    for loaded in documents.values() {
        for rule in &loaded.document.rules {
            rules.insert(rule.id.clone(), rule.clone());
        }
        for group in &loaded.document.rule_groups {
            rule_groups.insert(group.id.clone(), group.clone());
        }
        for chain in &loaded.document.rule_chains {
            rule_chains.insert(chain.id.clone(), chain.clone());
        }
        for enrichment in &loaded.document.enrichments {
            enrichments.insert(enrichment.id.clone(), enrichment.clone());
        }
    }

    (rules, rule_groups, rule_chains, enrichments)
}

/// Holds the current generation behind a lock, so a reload can atomically
/// swap it out without readers observing a half-built state.
pub struct ServiceRegistry {
    current: RwLock<Arc<Generation>>,
}

impl ServiceRegistry {
    /// Loads `root` and everything it transitively references, validates
    /// the whole graph, and builds the first generation.
    pub async fn load(root: &Path) -> Result<Self> {
        let generation = Self::build_generation(root).await?;
        Ok(ServiceRegistry { current: RwLock::new(Arc::new(generation)) })
    }

    /// Re-loads `root` and atomically replaces the active generation. The
    /// previous generation (and its pools) stays alive for in-flight work
    /// until its last `Arc` is dropped.
    pub async fn reload(&self, root: &Path) -> Result<()> {
        let generation = Self::build_generation(root).await?;
        let mut slot = self.current.write().expect("registry lock poisoned");
        *slot = Arc::new(generation);
        info!(root = %root.display(), "configuration reloaded to a new generation");
        Ok(())
    }

    pub fn current(&self) -> Arc<Generation> {
        self.current.read().expect("registry lock poisoned").clone()
    }

    async fn build_generation(root: &Path) -> Result<Generation> {
        let (root_key, documents) = loader::load_transitive(root)?;

        let report = analyze(&documents, &root_key);
        if !report.is_valid {
            return Err(ApexError::configuration(format!(
                "configuration at '{}' failed validation: {}",
                root.display(),
                report.root_causes.join("; ")
            )));
        }

        let (rules, rule_groups, rule_chains, enrichments) = collect_entities(&documents);
        let (data_sources, data_sinks, lookup_services) = build_pools(&documents).await?;

        let eval = Arc::new(ExprEval::new());
        let processor = EnrichmentProcessor::new(eval.clone(), lookup_services);

        info!(
            rules = rules.len(),
            rule_groups = rule_groups.len(),
            rule_chains = rule_chains.len(),
            enrichments = enrichments.len(),
            data_sources = data_sources.len(),
            data_sinks = data_sinks.len(),
            "built configuration generation"
        );

        Ok(Generation {
            rules,
            rule_groups,
            rule_chains,
            enrichments,
            data_sources,
            data_sinks,
            processor,
            eval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_defaults_when_fields_absent() {
        let conn = ConnectionConfig::default();
        assert_eq!(connection_url(&conn), "postgres://localhost:5432/apex");
    }

    #[test]
    fn connection_url_includes_username_when_present() {
        let conn = ConnectionConfig { username: Some("trader".into()), host: Some("db.internal".into()), port: Some(5433), database: Some("apex_prod".into()), ..Default::default() };
        assert_eq!(connection_url(&conn), "postgres://trader@db.internal:5433/apex_prod");
    }
}
