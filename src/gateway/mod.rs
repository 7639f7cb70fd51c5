//! The request/callback contract of the map engine.
//!
//! Every call is synchronous. Payloads produced while a call runs are handed
//! to the caller's [`GatewaySink`] in the order the engine produces them; the
//! engine's error callback becomes the call's `Err`.

mod decode;
mod elevation;
mod memory;
mod osm_parser;
mod style;

pub use decode::*;
pub use elevation::*;
pub use memory::*;
pub use osm_parser::*;
pub use style::*;

use std::path::Path;

use crate::{CancellationToken, ElevationDataType, GeoCoordinate, LodRange, MapQuery, QuadKey, Result};

/// Mesh payload as delivered by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub name: String,
    /// Interleaved x (longitude), y (latitude), height
    pub vertices: Vec<f64>,
    pub triangles: Vec<i32>,
    /// Packed `0xAARRGGBB` colors, one per vertex
    pub colors: Vec<i32>,
    /// Interleaved u, v pairs for each texture channel
    pub uvs: Vec<f64>,
    pub uvs2: Vec<f64>,
    pub uvs3: Vec<f64>,
}

/// Element payload as delivered by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawElement {
    pub id: u64,
    /// Alternating key, value strings
    pub tags: Vec<String>,
    /// Interleaved latitude, longitude, height
    pub vertices: Vec<f64>,
    /// Alternating key, value strings
    pub styles: Vec<String>,
}

/// Receives engine callbacks for the duration of one call
pub trait GatewaySink {
    fn on_mesh_built(&mut self, mesh: RawMesh);

    fn on_element_loaded(&mut self, element: RawElement);
}

/// Boundary toward the map engine
pub trait EngineGateway: Send + Sync {
    /// Identifier for logs
    fn engine_name(&self) -> &'static str;

    /// Open the engine's persistent index
    fn connect(&self, index_path: &Path) -> Result<()>;

    fn disconnect(&self);

    fn enable_mesh_cache(&self, enabled: bool);

    fn register_stylesheet(&self, path: &Path) -> Result<()>;

    fn register_in_memory_store(&self, key: &str) -> Result<()>;

    /// Register a file-backed store; the engine creates `path` if needed
    fn register_persistent_store(&self, key: &str, path: &Path) -> Result<()>;

    /// Import a data file and index it for every level in `lod_range`
    fn add_data_in_range(
        &self,
        key: &str,
        style: &Path,
        data: &Path,
        lod_range: LodRange,
        cancellation: &CancellationToken,
    ) -> Result<()>;

    /// Import the part of a data file that falls into one tile
    fn add_data_in_quad_key(
        &self,
        key: &str,
        style: &Path,
        data: &Path,
        quad_key: QuadKey,
        cancellation: &CancellationToken,
    ) -> Result<()>;

    /// Import one element given as primitive arrays:
    /// `coordinates` holds (lat, lon) pairs and `tags` holds (key, value) pairs
    #[allow(clippy::too_many_arguments)]
    fn add_data_in_element(
        &self,
        key: &str,
        style: &Path,
        id: u64,
        coordinates: &[f64],
        tags: &[String],
        lod_range: LodRange,
        cancellation: &CancellationToken,
    ) -> Result<()>;

    fn has_data(&self, quad_key: QuadKey) -> bool;

    /// Build a tile, reporting meshes and elements to `sink`
    fn get_data_by_quad_key(
        &self,
        style: &Path,
        quad_key: QuadKey,
        elevation: ElevationDataType,
        sink: &mut dyn GatewaySink,
        cancellation: &CancellationToken,
    ) -> Result<()>;

    /// Run a text and bounding box search, reporting elements to `sink`
    fn get_data_by_text(
        &self,
        query: &MapQuery,
        sink: &mut dyn GatewaySink,
        cancellation: &CancellationToken,
    ) -> Result<()>;

    fn get_elevation(
        &self,
        quad_key: QuadKey,
        elevation: ElevationDataType,
        coordinate: GeoCoordinate,
    ) -> Result<f64>;
}
