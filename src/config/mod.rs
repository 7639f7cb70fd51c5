mod builder;
mod region;

pub use builder::*;
pub use region::*;

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::{MapDataError, Result};

/// Storage key that receives data fetched by a tile data source
pub const DEFAULT_DOWNLOAD_STORAGE: &str = "default";

/// Configuration for the map data broker and its engine session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Directory where the engine keeps its persistent index
    pub index_path: PathBuf,
    /// Root directory for relative stylesheet and data paths
    pub asset_path: PathBuf,
    /// Whether the engine should cache built meshes
    pub mesh_cache: bool,
    /// Storage key that downloaded tile data is imported into
    pub download_storage: String,
    /// Maximum timeout for tile data downloads (in seconds)
    pub timeout_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("index"),
            asset_path: PathBuf::from("."),
            mesh_cache: true,
            download_storage: DEFAULT_DOWNLOAD_STORAGE.to_string(),
            timeout_seconds: 30,
        }
    }
}

impl BrokerConfig {
    /// Create a new configuration for the given index directory
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    /// Set the root directory for relative stylesheet and data paths
    pub fn with_asset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.asset_path = path.into();
        self
    }

    /// Enable or disable the engine's mesh cache
    pub fn with_mesh_cache(mut self, enabled: bool) -> Self {
        self.mesh_cache = enabled;
        self
    }

    /// Set the storage key downloaded data is imported into
    pub fn with_download_storage(mut self, key: impl Into<String>) -> Self {
        self.download_storage = key.into();
        self
    }

    /// Set the download timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Create a builder for more complex configuration
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::new()
    }

    /// Load a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MapDataError::Config(format!("Invalid configuration JSON: {}", e)))
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MapDataError::Config(format!(
                "Failed to read configuration '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Check the configuration before any engine call is made
    pub fn validate(&self) -> Result<()> {
        if !self.index_path.is_dir() {
            return Err(MapDataError::Config(format!(
                "Index directory '{}' does not exist",
                self.index_path.display()
            )));
        }
        if self.download_storage.trim().is_empty() {
            return Err(MapDataError::Config(
                "Download storage key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a stylesheet or data path to an absolute path
    ///
    /// Relative paths are taken relative to the asset root. `.` and `..` are
    /// removed lexically; symlinks are not followed, so the file does not need
    /// to exist yet.
    pub fn resolve_path(&self, path: &Path) -> Result<PathBuf> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.asset_path.join(path)
        };
        let absolute = std::path::absolute(&joined).map_err(MapDataError::from)?;
        Ok(normalize_lexically(&absolute))
    }
}

/// Drop `.` components and let `..` remove the preceding component
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
