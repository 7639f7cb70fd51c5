//! Sources that fetch tile data files the engine does not have yet.

mod file;
mod mock;
mod overpass;

pub use file::*;
pub use mock::*;
pub use overpass::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::{MapDataError, QuadKey, Result};

/// A data file on disk, ready to be ingested for one tile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFile {
    pub path: PathBuf,
    pub quad_key: QuadKey,
    pub metadata: DataFileMetadata,
}

/// Metadata about how a data file was obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFileMetadata {
    /// RFC 3339 timestamp when the file was produced
    pub timestamp: String,
    /// Where the data came from, e.g. an endpoint URL or a directory
    pub source: String,
    /// Source type identifier
    pub source_type: String,
    /// Number of elements in the file, when known
    pub element_count: Option<u32>,
    /// Time spent fetching in milliseconds
    pub processing_time_ms: Option<u64>,
    pub extra: HashMap<String, String>,
}

impl DataFileMetadata {
    pub fn new(source: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            source: source.into(),
            source_type: source_type.into(),
            element_count: None,
            processing_time_ms: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_element_count(mut self, count: u32) -> Self {
        self.element_count = Some(count);
        self
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Number of entries in an Overpass JSON document's `elements` array
pub(crate) fn count_elements(json_data: &str) -> Option<u32> {
    let value = serde_json::from_str::<serde_json::Value>(json_data).ok()?;
    let elements = value.get("elements")?.as_array()?;
    u32::try_from(elements.len()).ok()
}

/// Fetches the data file for a tile before the engine is asked to build it
#[async_trait]
pub trait TileDataSource: Send + Sync {
    /// Source type identifier (e.g. "overpass", "mock")
    fn source_type(&self) -> &'static str;

    /// Produce a data file covering `quad_key`, or `None` when the source has nothing
    async fn fetch_tile_data(&self, quad_key: QuadKey) -> Result<Option<DataFile>>;

    /// Check that the source can currently serve requests
    async fn test_availability(&self) -> Result<()>;

    fn capabilities(&self) -> SourceCapabilities;
}

/// Describes the capabilities and limitations of a data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCapabilities {
    /// Whether this source requires internet connectivity
    pub requires_network: bool,
    /// Largest tile area the source accepts in square kilometers
    pub max_area_km2: Option<f64>,
    /// Rate limit in requests per minute
    pub rate_limit_rpm: Option<u32>,
    /// Whether this source works in WASM environments
    pub wasm_compatible: bool,
    pub notes: Option<String>,
}

impl Default for SourceCapabilities {
    fn default() -> Self {
        Self {
            requires_network: false,
            max_area_km2: None,
            rate_limit_rpm: None,
            wasm_compatible: true,
            notes: None,
        }
    }
}

/// Creates tile data sources by name
pub struct SourceFactory;

impl SourceFactory {
    /// Overpass source writing into `cache_dir`, using the default HTTP client
    pub fn overpass(cache_dir: impl Into<PathBuf>) -> Result<OverpassSource> {
        Ok(OverpassSource::new(
            crate::http::create_default_client()?,
            cache_dir,
        ))
    }

    pub fn mock(cache_dir: impl Into<PathBuf>) -> MockSource {
        MockSource::new(cache_dir)
    }

    pub fn file(directory: impl Into<PathBuf>) -> FileSource {
        FileSource::new(directory)
    }

    pub fn available_sources() -> Vec<&'static str> {
        vec!["overpass", "mock", "file"]
    }

    /// Create a source by name; `directory` is the cache or data directory
    pub fn create_source(name: &str, directory: impl Into<PathBuf>) -> Result<Box<dyn TileDataSource>> {
        match name {
            "overpass" => Ok(Box::new(Self::overpass(directory)?)),
            "mock" => Ok(Box::new(Self::mock(directory))),
            "file" => Ok(Box::new(Self::file(directory))),
            _ => Err(MapDataError::Config(format!(
                "Unknown data source: '{}'. Available sources: {:?}",
                name,
                Self::available_sources()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let metadata = DataFileMetadata::new("cache", "mock")
            .with_element_count(3)
            .with_processing_time(12)
            .with_extra("simulated", "true");

        assert_eq!(metadata.source_type, "mock");
        assert_eq!(metadata.element_count, Some(3));
        assert_eq!(metadata.processing_time_ms, Some(12));
        assert_eq!(metadata.extra.get("simulated"), Some(&"true".to_string()));
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.timestamp).is_ok());
    }

    #[test]
    fn test_count_elements() {
        assert_eq!(count_elements(r#"{"elements": [{}, {}]}"#), Some(2));
        assert_eq!(count_elements(r#"{"version": 0.6}"#), None);
        assert_eq!(count_elements("<osm/>"), None);
    }

    #[test]
    fn test_unknown_source() {
        assert!(matches!(
            SourceFactory::create_source("carrier-pigeon", "/tmp"),
            Err(MapDataError::Config(_))
        ));
        assert_eq!(SourceFactory::available_sources().len(), 3);
    }
}
