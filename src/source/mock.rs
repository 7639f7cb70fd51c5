use async_trait::async_trait;
use std::path::PathBuf;

use super::{DataFile, DataFileMetadata, SourceCapabilities, TileDataSource, count_elements};
use crate::{MapDataError, NetworkError, QuadKey, Result};

/// Source that serves canned Overpass JSON for every tile.
///
/// The data is written to `<cache_dir>/<quadkey>.json` on each fetch, so the
/// engine ingests it like any downloaded file.
pub struct MockSource {
    cache_dir: PathBuf,
    mock_data: String,
    simulate_failure: bool,
}

impl MockSource {
    /// Serve the default test data
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_data(cache_dir, DEFAULT_MOCK_DATA)
    }

    /// Serve custom data
    pub fn with_data(cache_dir: impl Into<PathBuf>, data: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            mock_data: data.into(),
            simulate_failure: false,
        }
    }

    /// Fail every fetch with a network error
    pub fn with_failure(mut self) -> Self {
        self.simulate_failure = true;
        self
    }
}

#[async_trait]
impl TileDataSource for MockSource {
    fn source_type(&self) -> &'static str {
        "mock"
    }

    async fn fetch_tile_data(&self, quad_key: QuadKey) -> Result<Option<DataFile>> {
        if self.simulate_failure {
            return Err(MapDataError::Network(NetworkError::Connection {
                message: "Simulated network failure".to_string(),
            }));
        }

        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join(format!("{}.json", quad_key));
        std::fs::write(&path, &self.mock_data)?;

        let mut metadata = DataFileMetadata::new(self.cache_dir.display().to_string(), self.source_type())
            .with_processing_time(0)
            .with_extra("simulated", "true");
        if let Some(count) = count_elements(&self.mock_data) {
            metadata = metadata.with_element_count(count);
        }

        tracing::debug!(
            "Mock source wrote {} bytes for tile {} to {}",
            self.mock_data.len(),
            quad_key,
            path.display()
        );

        Ok(Some(DataFile {
            path,
            quad_key,
            metadata,
        }))
    }

    async fn test_availability(&self) -> Result<()> {
        if self.simulate_failure {
            Err(MapDataError::Network(NetworkError::Connection {
                message: "Mock failure enabled".to_string(),
            }))
        } else {
            Ok(())
        }
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            notes: Some("Canned test data. Works in all environments.".to_string()),
            ..Default::default()
        }
    }
}

/// A small neighbourhood in Berlin Mitte
const DEFAULT_MOCK_DATA: &str = r#"{
  "version": 0.6,
  "generator": "osm-map-broker mock source",
  "elements": [
    {
      "type": "way",
      "id": 123456789,
      "tags": {
        "building": "residential",
        "addr:city": "Berlin",
        "addr:street": "Mock Street",
        "addr:housenumber": "42"
      },
      "geometry": [
        {"lat": 52.5, "lon": 13.4},
        {"lat": 52.501, "lon": 13.4},
        {"lat": 52.501, "lon": 13.401},
        {"lat": 52.5, "lon": 13.401},
        {"lat": 52.5, "lon": 13.4}
      ]
    },
    {
      "type": "way",
      "id": 987654321,
      "tags": {
        "highway": "residential",
        "name": "Mock Street"
      },
      "geometry": [
        {"lat": 52.499, "lon": 13.399},
        {"lat": 52.502, "lon": 13.402}
      ]
    },
    {
      "type": "way",
      "id": 555666777,
      "tags": {
        "leisure": "park",
        "name": "Mock Park"
      },
      "geometry": [
        {"lat": 52.503, "lon": 13.403},
        {"lat": 52.504, "lon": 13.403},
        {"lat": 52.504, "lon": 13.405},
        {"lat": 52.503, "lon": 13.405},
        {"lat": 52.503, "lon": 13.403}
      ]
    },
    {
      "type": "node",
      "id": 4001,
      "lat": 52.5015,
      "lon": 13.4015,
      "tags": {
        "amenity": "cafe",
        "name": "Mock Cafe"
      }
    }
  ]
}"#;
