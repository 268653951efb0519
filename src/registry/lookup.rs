//! Adapts a `DataSourceBackend` into a `LookupService`, so enrichments can
//! resolve lookups against a real database or REST source the same way
//! they resolve against an in-memory table (§4.5, §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::enrichment::LookupService;
use crate::error::{ApexError, Result};
use crate::expr::Value;
use crate::pool::DataSourceBackend;

/// Query name convention for lookup-backed data sources: a source used as a
/// `lookupService` is expected to declare a `queries.lookup` (SQL) or
/// `endpoints.lookup` (REST) template keyed by its first `parameterNames`
/// entry.
pub const LOOKUP_QUERY_NAME: &str = "lookup";

pub struct DataSourceLookupService {
    backend: Arc<DataSourceBackend>,
}

impl DataSourceLookupService {
    pub fn new(backend: Arc<DataSourceBackend>) -> Self {
        DataSourceLookupService { backend }
    }
}

#[async_trait]
impl LookupService for DataSourceLookupService {
    async fn lookup(&self, key: &Value, token: &CancellationToken) -> Result<Option<HashMap<String, Value>>> {
        let param_name = self.backend.parameter_names().first().cloned().ok_or_else(|| {
            ApexError::configuration(format!(
                "data source '{}' used as a lookup service declares no parameterNames",
                self.backend.name()
            ))
        })?;
        let mut params = HashMap::new();
        params.insert(param_name, key.clone());

        let mut rows = self.backend.query(LOOKUP_QUERY_NAME, &params, token).await?;
        Ok(rows.pop())
    }
}
