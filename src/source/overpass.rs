use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::{DataFile, DataFileMetadata, SourceCapabilities, TileDataSource, count_elements};
use crate::http::HttpClient;
use crate::{BoundingBox, MapDataError, NetworkError, QuadKey, Result};

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Tiles larger than this are refused
pub const MAX_TILE_AREA_KM2: f64 = 5000.0;

/// Tag keys queried for every tile
const FEATURE_KEYS: &[&str] = &[
    "building", "highway", "waterway", "natural", "landuse", "leisure", "railway", "amenity",
    "tourism", "addr:housenumber",
];

/// Source downloading tile data from an Overpass API endpoint.
///
/// The query is sent as an URL-encoded GET parameter and the response body is
/// cached as `<cache_dir>/<quadkey>.json`.
pub struct OverpassSource {
    pub base_url: String,
    client: Arc<dyn HttpClient>,
    cache_dir: PathBuf,
    timeout_seconds: u64,
}

impl OverpassSource {
    pub fn new(client: Arc<dyn HttpClient>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_OVERPASS_URL.to_string(),
            client,
            cache_dir: cache_dir.into(),
            timeout_seconds: 30,
        }
    }

    /// Use another Overpass endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Server-side timeout placed in the query
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    fn should_include_relations(key: &str) -> bool {
        matches!(
            key,
            "building" | "natural" | "landuse" | "leisure" | "waterway"
        )
    }

    fn should_include_nodes(key: &str) -> bool {
        matches!(key, "amenity" | "tourism" | "addr:housenumber")
    }

    /// Build an Overpass QL query for every feature key within `bbox`
    pub fn build_query(&self, bbox: &BoundingBox) -> String {
        let bbox_str = format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east);
        let mut query = format!("[out:json][timeout:{}];\n(\n", self.timeout_seconds);

        for key in FEATURE_KEYS {
            let filter = format!("[\"{}\"]", key);
            query.push_str(&format!("  way{}({});\n", filter, bbox_str));
            if Self::should_include_relations(key) {
                query.push_str(&format!("  relation{}({});\n", filter, bbox_str));
            }
            if Self::should_include_nodes(key) {
                query.push_str(&format!("  node{}({});\n", filter, bbox_str));
            }
        }

        query.push_str(");\nout geom;");
        query
    }

    fn request_url(&self, query: &str) -> String {
        format!("{}?data={}", self.base_url, urlencoding::encode(query))
    }
}

#[async_trait]
impl TileDataSource for OverpassSource {
    fn source_type(&self) -> &'static str {
        "overpass"
    }

    async fn fetch_tile_data(&self, quad_key: QuadKey) -> Result<Option<DataFile>> {
        let start_time = chrono::Utc::now();
        let bbox = quad_key.bounding_box();

        let area_km2 = bbox.area_km2();
        if area_km2 > 1000.0 {
            tracing::warn!(
                "Large tile requested: {} covers {:.2} km²",
                quad_key,
                area_km2
            );
        }
        if area_km2 > MAX_TILE_AREA_KM2 {
            return Err(MapDataError::Config(format!(
                "Tile {} is too large for Overpass: {:.2} km² (limit {} km²)",
                quad_key, area_km2, MAX_TILE_AREA_KM2
            )));
        }

        let query = self.build_query(&bbox);
        tracing::info!("Downloading tile {} from {}", quad_key, self.base_url);
        tracing::debug!("Overpass query: {}", query);

        let response = self.client.get(&self.request_url(&query)).await?;
        if !response.is_success() {
            return Err(MapDataError::Network(NetworkError::HttpError {
                status: response.status,
            }));
        }

        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join(format!("{}.json", quad_key));
        std::fs::write(&path, &response.body)?;

        let processing_time = (chrono::Utc::now() - start_time).num_milliseconds().max(0) as u64;
        let element_count = count_elements(&response.body);

        let mut metadata = DataFileMetadata::new(&self.base_url, self.source_type())
            .with_processing_time(processing_time)
            .with_extra("area_km2", format!("{:.2}", area_km2))
            .with_extra(
                "bbox",
                format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east),
            );
        if let Some(count) = element_count {
            metadata = metadata.with_element_count(count);
        }

        tracing::info!(
            "Downloaded tile {}: {} elements, {:.2} KB",
            quad_key,
            element_count.unwrap_or(0),
            response.body.len() as f64 / 1024.0
        );

        Ok(Some(DataFile {
            path,
            quad_key,
            metadata,
        }))
    }

    async fn test_availability(&self) -> Result<()> {
        tracing::debug!("Testing Overpass API availability");

        let test_query = "[out:json][timeout:5];\nnode(0,0,0.001,0.001);\nout;";
        let response = self.client.get(&self.request_url(test_query)).await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(MapDataError::Network(NetworkError::HttpError {
                status: response.status,
            }))
        }
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            requires_network: true,
            max_area_km2: Some(MAX_TILE_AREA_KM2),
            rate_limit_rpm: Some(60),
            wasm_compatible: true,
            notes: Some("Live OSM data via the Overpass API".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{BERLIN_OSM_JSON, StubHttpClient, temp_dir};

    #[test]
    fn test_build_query() {
        let source = OverpassSource::new(Arc::new(StubHttpClient::ok("")), "/tmp").with_timeout(45);
        let query = source.build_query(&BoundingBox::new(52.5, 13.3, 52.6, 13.4));

        assert!(query.starts_with("[out:json][timeout:45];"));
        assert!(query.contains("way[\"highway\"](52.5,13.3,52.6,13.4);"));
        assert!(query.contains("relation[\"building\"](52.5,13.3,52.6,13.4);"));
        assert!(query.contains("node[\"amenity\"](52.5,13.3,52.6,13.4);"));
        assert!(!query.contains("relation[\"highway\"]"));
        assert!(query.ends_with("out geom;"));
    }

    #[tokio::test]
    async fn test_fetch_writes_cache_file() {
        let client = Arc::new(StubHttpClient::ok(BERLIN_OSM_JSON));
        let dir = temp_dir("overpass-source");
        let source = OverpassSource::new(client.clone(), &dir).with_base_url("https://overpass.test/api");

        let quad_key = QuadKey::new(8800, 5373, 14);
        let file = source.fetch_tile_data(quad_key).await.unwrap().unwrap();

        assert_eq!(file.path, dir.join("12021023322202.json"));
        assert_eq!(std::fs::read_to_string(&file.path).unwrap(), BERLIN_OSM_JSON);
        assert_eq!(file.metadata.element_count, Some(3));
        assert_eq!(file.metadata.source, "https://overpass.test/api");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("https://overpass.test/api?data=%5Bout%3Ajson%5D"));
        assert!(!requests[0].contains(' '));
    }

    #[tokio::test]
    async fn test_fetch_rejects_large_tiles() {
        let client = Arc::new(StubHttpClient::ok(BERLIN_OSM_JSON));
        let source = OverpassSource::new(client.clone(), temp_dir("overpass-large"));

        let result = source.fetch_tile_data(QuadKey::new(1, 1, 3)).await;
        assert!(matches!(result, Err(MapDataError::Config(_))));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let client = Arc::new(StubHttpClient::with_status(429, "rate limited"));
        let source = OverpassSource::new(client, temp_dir("overpass-error"));

        let result = source.fetch_tile_data(QuadKey::new(8800, 5373, 14)).await;
        assert!(matches!(
            result,
            Err(MapDataError::Network(NetworkError::HttpError { status: 429 }))
        ));
        assert!(source.test_availability().await.is_err());
    }

    #[test]
    fn test_capabilities() {
        let source = OverpassSource::new(Arc::new(StubHttpClient::ok("")), "/tmp");
        let capabilities = source.capabilities();
        assert!(capabilities.requires_network);
        assert_eq!(capabilities.max_area_km2, Some(MAX_TILE_AREA_KM2));
    }
}
