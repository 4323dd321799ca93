use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{keys, ConfigStore};
use crate::error::FlowError;

/// Connection pool and timeout settings of the shared HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpPoolConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub max_pool_size: usize,
    pub keep_alive_minutes: u64,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            max_pool_size: 100,
            keep_alive_minutes: 5,
        }
    }
}

impl HttpPoolConfig {
    /// Defaults overlaid with whatever the store holds.
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let mut config = Self::default();
        config.overlay(store);
        config
    }

    /// Replace fields with values present in `store`. Unparseable values keep the current setting.
    pub fn overlay(&mut self, store: &dyn ConfigStore) {
        overlay_value(store, keys::HTTP_CONNECT_TIMEOUT, &mut self.connect_timeout_secs);
        overlay_value(store, keys::HTTP_READ_TIMEOUT, &mut self.read_timeout_secs);
        overlay_value(store, keys::HTTP_WRITE_TIMEOUT, &mut self.write_timeout_secs);
        overlay_value(store, keys::HTTP_MAX_POOL_SIZE, &mut self.max_pool_size);
        overlay_value(store, keys::HTTP_KEEP_ALIVE_DURATION, &mut self.keep_alive_minutes);
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Whole-request budget: connect, then write the request, then read the response.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .saturating_add(self.read_timeout_secs)
                .saturating_add(self.write_timeout_secs),
        )
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_minutes.saturating_mul(60))
    }
}

fn overlay_value<T>(store: &dyn ConfigStore, key: &str, target: &mut T)
where
    T: std::str::FromStr + std::fmt::Display,
{
    let Some(raw) = store.get(key) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, default = %target, "Invalid config value, using default"),
    }
}

/// Owner of the process-wide pooled HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientProvider {
    client: reqwest::Client,
    config: HttpPoolConfig,
}

impl HttpClientProvider {
    pub fn new(config: HttpPoolConfig) -> Result<Self, FlowError> {
        let client = Self::apply_pool_options(reqwest::Client::builder(), &config)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to build HTTP client");
                FlowError::SystemBusy
            })?;
        Ok(Self { client, config })
    }

    fn apply_pool_options(
        builder: reqwest::ClientBuilder,
        config: &HttpPoolConfig,
    ) -> reqwest::ClientBuilder {
        builder
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.max_pool_size)
            .pool_idle_timeout(config.keep_alive())
    }

    pub fn client(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub fn config(&self) -> &HttpPoolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MapConfigStore;

    #[test]
    fn test_http_pool_config_default() {
        let config = HttpPoolConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
        assert_eq!(config.write_timeout_secs, 30);
        assert_eq!(config.max_pool_size, 100);
        assert_eq!(config.keep_alive(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(70));
    }

    #[test]
    fn test_from_store_overlays_and_ignores_garbage() {
        let store = MapConfigStore::from_pairs([
            (keys::HTTP_CONNECT_TIMEOUT, "3"),
            (keys::HTTP_MAX_POOL_SIZE, "lots"),
            (keys::HTTP_KEEP_ALIVE_DURATION, " 1 "),
        ]);
        let config = HttpPoolConfig::from_store(&store);
        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.max_pool_size, 100);
        assert_eq!(config.keep_alive_minutes, 1);
        assert_eq!(config.read_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_provider_builds_client() {
        let provider = HttpClientProvider::new(HttpPoolConfig::default()).unwrap();
        assert_eq!(provider.config().max_pool_size, 100);
        let _client = provider.client();
    }
}
