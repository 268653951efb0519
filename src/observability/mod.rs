//! Observability — metrics and the error taxonomy surface (§2 "Observability").
//! The error taxonomy itself lives in [`crate::error`]; this module carries
//! the counters/histograms referenced throughout §4.4 and §5.

pub mod metrics;

pub use metrics::PoolMetrics;
