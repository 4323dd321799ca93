//! Engine configuration.
//!
//! Settings come from a TOML or JSON file ([`PilotConfig`]) and are then
//! overlaid with key/value pairs from a [`ConfigStore`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::http_client::HttpPoolConfig;
use crate::error::FlowError;

pub mod keys {
    pub const HTTP_CONNECT_TIMEOUT: &str = "HTTP_CONNECT_TIMEOUT";
    pub const HTTP_READ_TIMEOUT: &str = "HTTP_READ_TIMEOUT";
    pub const HTTP_WRITE_TIMEOUT: &str = "HTTP_WRITE_TIMEOUT";
    pub const HTTP_MAX_POOL_SIZE: &str = "HTTP_MAX_POOL_SIZE";
    pub const HTTP_KEEP_ALIVE_DURATION: &str = "HTTP_KEEP_ALIVE_DURATION";
    pub const MAX_CONCURRENT_RUNS: &str = "MAX_CONCURRENT_RUNS";
}

/// Source of string configuration values.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads keys from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvConfigStore;

impl ConfigStore for EnvConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MapConfigStore {
    values: HashMap<String, String>,
}

impl MapConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigStore for MapConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub http: HttpPoolConfig,
    /// Runs allowed at the same time before `run_flow` answers "system busy".
    pub max_concurrent_runs: usize,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            http: HttpPoolConfig::default(),
            max_concurrent_runs: 4,
        }
    }
}

impl PilotConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, FlowError> {
        toml::from_str(text).map_err(|e| FlowError::ConfigError(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self, FlowError> {
        serde_json::from_str(text).map_err(|e| FlowError::ConfigError(e.to_string()))
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FlowError::ConfigError(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    pub fn overlay(mut self, store: &dyn ConfigStore) -> Self {
        self.http.overlay(store);
        if let Some(raw) = store.get(keys::MAX_CONCURRENT_RUNS) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.max_concurrent_runs = n,
                _ => tracing::warn!(value = %raw, "Invalid MAX_CONCURRENT_RUNS, keeping {}", self.max_concurrent_runs),
            }
        }
        self
    }
}
