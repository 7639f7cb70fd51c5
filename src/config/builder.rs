use std::path::PathBuf;

use super::{BrokerConfig, DEFAULT_DOWNLOAD_STORAGE};

/// Builder for creating broker configurations with a fluent API
#[derive(Debug, Clone, Default)]
pub struct BrokerConfigBuilder {
    index_path: Option<PathBuf>,
    asset_path: Option<PathBuf>,
    mesh_cache: Option<bool>,
    download_storage: Option<String>,
    timeout_seconds: Option<u64>,
}

impl BrokerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine index directory
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Set the root for relative stylesheet and data paths
    pub fn asset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.asset_path = Some(path.into());
        self
    }

    /// Enable or disable mesh caching
    pub fn mesh_cache(mut self, enabled: bool) -> Self {
        self.mesh_cache = Some(enabled);
        self
    }

    /// Set the storage key for downloaded data
    pub fn download_storage(mut self, key: impl Into<String>) -> Self {
        self.download_storage = Some(key.into());
        self
    }

    /// Set the timeout
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Build the configuration, falling back to defaults for unset values
    pub fn build(self) -> BrokerConfig {
        let defaults = BrokerConfig::default();
        BrokerConfig {
            index_path: self.index_path.unwrap_or(defaults.index_path),
            asset_path: self.asset_path.unwrap_or(defaults.asset_path),
            mesh_cache: self.mesh_cache.unwrap_or(defaults.mesh_cache),
            download_storage: self
                .download_storage
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_STORAGE.to_string()),
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        }
    }
}
