//! Process-level configuration (§11) — distinct from the business YAML
//! documents described in §3, which are APEX's actual subject matter.
//!
//! Layered `default.toml` < environment variables prefixed `APEX_` via the
//! `config` crate, with `dotenv` loading a local `.env` file first.

use serde::{Deserialize, Serialize};

use crate::error::{ApexError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDefaults {
    #[serde(default = "default_min")]
    pub min: u32,
    #[serde(default = "default_initial")]
    pub initial: u32,
    #[serde(default = "default_max")]
    pub max: u32,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

fn default_min() -> u32 {
    1
}
fn default_initial() -> u32 {
    2
}
fn default_max() -> u32 {
    10
}
fn default_connection_timeout_ms() -> u64 {
    5_000
}

impl Default for PoolDefaults {
    fn default() -> Self {
        PoolDefaults {
            min: default_min(),
            initial: default_initial(),
            max: default_max(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub config_roots: Vec<String>,
    #[serde(default)]
    pub pool_defaults: PoolDefaults,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: default_log_level(),
            config_roots: vec![".".to_string()],
            pool_defaults: PoolDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Loads `default.toml` (if present) overlaid with `APEX_`-prefixed
    /// environment variables, e.g. `APEX_LOG_LEVEL=debug`.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("default").required(false))
            .add_source(config::Environment::with_prefix("APEX").separator("__"));

        let built = builder
            .build()
            .map_err(|e| ApexError::configuration(format!("loading process configuration: {e}")))?;

        built
            .try_deserialize()
            .map_err(|e| ApexError::configuration(format!("parsing process configuration: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_pool_invariant() {
        let defaults = PoolDefaults::default();
        assert!(defaults.min <= defaults.initial);
        assert!(defaults.initial <= defaults.max);
        assert!(defaults.connection_timeout_ms > 0);
    }
}
