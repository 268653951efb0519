//! EnrichmentProcessor (§4.5): lookup and calculation enrichments applied
//! to records in priority order ahead of rule evaluation.

pub mod cache;
pub mod processor;

pub use cache::LookupCache;
pub use processor::{EnrichmentError, EnrichmentProcessor, InMemoryLookupService, LookupService};
