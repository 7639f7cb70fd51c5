use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    ElevationGrid, EngineGateway, FeatureKind, GatewaySink, OsmParser, RawMesh, decode_coordinates,
    decode_pairs, encode_element, resolve_styles,
};
use crate::{
    BoundingBox, CancellationToken, ElevationDataType, Element, GeoCoordinate, LodRange, MapDataError,
    MapQuery, QuadKey, Result, keywords,
};

/// Elements spanning more tiles than this at one level are not indexed there
pub const MAX_TILES_PER_ELEMENT: u64 = 4096;

/// Call counters, mainly for tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub connects: usize,
    pub disconnects: usize,
    pub stylesheet_registrations: usize,
    pub store_registrations: usize,
    pub range_imports: usize,
    pub quad_key_imports: usize,
    pub element_imports: usize,
    pub tile_requests: usize,
    pub text_requests: usize,
    pub elevation_requests: usize,
    pub mesh_cache: bool,
}

#[derive(Debug, Default)]
struct Store {
    directory: Option<PathBuf>,
    tiles: HashMap<QuadKey, BTreeMap<u64, Element>>,
}

impl Store {
    fn index(&mut self, element: &Element, level_of_detail: u8) {
        let Some(bbox) = element.bounding_box() else {
            return;
        };

        let count = QuadKey::covering_count(&bbox, level_of_detail);
        if count > MAX_TILES_PER_ELEMENT {
            tracing::warn!(
                "Element {} spans {} tiles at level {}, not indexing it there",
                element.id(),
                count,
                level_of_detail
            );
            return;
        }

        for quad_key in QuadKey::covering(&bbox, level_of_detail) {
            self.tiles
                .entry(quad_key)
                .or_default()
                .insert(element.id(), element.clone());
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    index_path: Option<PathBuf>,
    stylesheets: HashSet<PathBuf>,
    stores: HashMap<String, Store>,
    stats: EngineStats,
}

impl EngineState {
    fn store_mut(&mut self, key: &str) -> Result<&mut Store> {
        self.stores
            .get_mut(key)
            .ok_or_else(|| MapDataError::Engine(format!("Unknown store '{}'", key)))
    }

    /// Elements indexed for a tile across all stores, ordered by id
    fn elements_at(&self, quad_key: &QuadKey) -> BTreeMap<u64, Element> {
        let mut elements = BTreeMap::new();
        for store in self.stores.values() {
            if let Some(tile) = store.tiles.get(quad_key) {
                for (id, element) in tile {
                    elements.entry(*id).or_insert_with(|| element.clone());
                }
            }
        }
        elements
    }
}

/// Map engine that keeps everything in process memory.
///
/// Imports Overpass JSON files, indexes elements by quadkey, answers tile
/// and text requests and samples elevation from registered grids.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
    elevation: HashMap<ElevationDataType, ElevationGrid>,
    should_fail: bool,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every data call fail with an engine error
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Serve heights of the given type from `grid`
    pub fn with_elevation_grid(mut self, elevation: ElevationDataType, grid: ElevationGrid) -> Self {
        self.elevation.insert(elevation, grid);
        self
    }

    pub fn stats(&self) -> EngineStats {
        self.lock().stats.clone()
    }

    /// Directory backing a persistent store
    pub fn store_directory(&self, key: &str) -> Option<PathBuf> {
        self.lock().stores.get(key)?.directory.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().index_path.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state for a data call, checking connection and failure mode
    fn lock_for_data(&self, operation: &str) -> Result<MutexGuard<'_, EngineState>> {
        let state = self.lock();
        if state.index_path.is_none() {
            return Err(MapDataError::Engine(format!(
                "{}: engine is not connected",
                operation
            )));
        }
        if self.should_fail {
            return Err(MapDataError::Engine(format!("{}: simulated engine failure", operation)));
        }
        Ok(state)
    }

    fn parse_data_file(data: &Path) -> Result<Vec<Element>> {
        OsmParser
            .parse_file(data)
            .map_err(|e| MapDataError::Engine(e.to_string()))
    }

    fn height(&self, elevation: ElevationDataType, coordinate: &GeoCoordinate) -> Result<f64> {
        if elevation == ElevationDataType::Flat {
            return Ok(0.0);
        }
        let grid = self.elevation.get(&elevation).ok_or_else(|| {
            MapDataError::Engine(format!("No elevation data registered for {:?}", elevation))
        })?;
        Ok(grid.sample(coordinate).unwrap_or(0.0))
    }

    fn terrain_mesh(&self, quad_key: QuadKey, elevation: ElevationDataType) -> Result<RawMesh> {
        let bbox = quad_key.bounding_box();
        let corners = [
            GeoCoordinate::new(bbox.south, bbox.west),
            GeoCoordinate::new(bbox.south, bbox.east),
            GeoCoordinate::new(bbox.north, bbox.east),
            GeoCoordinate::new(bbox.north, bbox.west),
        ];

        let mut vertices = Vec::with_capacity(corners.len() * 3);
        for corner in &corners {
            vertices.extend([corner.longitude, corner.latitude, self.height(elevation, corner)?]);
        }

        Ok(RawMesh {
            name: format!("terrain_{}", quad_key),
            vertices,
            triangles: vec![0, 1, 2, 0, 2, 3],
            colors: vec![FeatureKind::Unclassified.default_color().to_packed(); corners.len()],
            uvs: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            uvs2: Vec::new(),
            uvs3: Vec::new(),
        })
    }
}

/// Whether any tag value contains `word`, ignoring case
fn mentions(element: &Element, word: &str) -> bool {
    element
        .tags()
        .values()
        .any(|value| value.to_lowercase().contains(word))
}

fn matches_query(element: &Element, query: &MapQuery) -> bool {
    let and_terms = keywords(&query.and_terms);
    let or_terms = keywords(&query.or_terms);
    let not_terms = keywords(&query.not_terms);

    and_terms.iter().all(|word| mentions(element, word))
        && (or_terms.is_empty() || or_terms.iter().any(|word| mentions(element, word)))
        && !not_terms.iter().any(|word| mentions(element, word))
}

impl EngineGateway for InMemoryEngine {
    fn engine_name(&self) -> &'static str {
        "in-memory"
    }

    fn connect(&self, index_path: &Path) -> Result<()> {
        if !index_path.is_dir() {
            return Err(MapDataError::Engine(format!(
                "Index directory '{}' does not exist",
                index_path.display()
            )));
        }

        let mut state = self.lock();
        state.index_path = Some(index_path.to_path_buf());
        state.stats.connects += 1;
        tracing::debug!("In-memory engine connected to {}", index_path.display());
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.lock();
        state.index_path = None;
        state.stylesheets.clear();
        state.stores.clear();
        state.stats.disconnects += 1;
    }

    fn enable_mesh_cache(&self, enabled: bool) {
        self.lock().stats.mesh_cache = enabled;
    }

    fn register_stylesheet(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        state.stylesheets.insert(path.to_path_buf());
        state.stats.stylesheet_registrations += 1;
        Ok(())
    }

    fn register_in_memory_store(&self, key: &str) -> Result<()> {
        let mut state = self.lock();
        state.stores.entry(key.to_string()).or_default();
        state.stats.store_registrations += 1;
        Ok(())
    }

    fn register_persistent_store(&self, key: &str, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| {
            MapDataError::Engine(format!(
                "Failed to create store directory '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut state = self.lock();
        let store = state.stores.entry(key.to_string()).or_default();
        store.directory = Some(path.to_path_buf());
        state.stats.store_registrations += 1;
        Ok(())
    }

    fn add_data_in_range(
        &self,
        key: &str,
        _style: &Path,
        data: &Path,
        lod_range: LodRange,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        {
            let mut state = self.lock_for_data("add_data_in_range")?;
            state.store_mut(key)?;
            state.stats.range_imports += 1;
        }

        let elements = Self::parse_data_file(data)?;

        let mut state = self.lock();
        let store = state.store_mut(key)?;
        for element in &elements {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            for level_of_detail in lod_range.levels() {
                store.index(element, level_of_detail);
            }
        }

        tracing::debug!(
            "Indexed {} elements from {} into store '{}'",
            elements.len(),
            data.display(),
            key
        );
        Ok(())
    }

    fn add_data_in_quad_key(
        &self,
        key: &str,
        _style: &Path,
        data: &Path,
        quad_key: QuadKey,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        {
            let mut state = self.lock_for_data("add_data_in_quad_key")?;
            state.store_mut(key)?;
            state.stats.quad_key_imports += 1;
        }

        let elements = Self::parse_data_file(data)?;
        let tile_bounds = quad_key.bounding_box();

        let mut state = self.lock();
        let store = state.store_mut(key)?;
        let tile = store.tiles.entry(quad_key).or_default();
        for element in elements {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let touches_tile = element
                .bounding_box()
                .is_some_and(|bbox| bbox.intersects(&tile_bounds));
            if touches_tile {
                tile.insert(element.id(), element);
            }
        }

        Ok(())
    }

    fn add_data_in_element(
        &self,
        key: &str,
        _style: &Path,
        id: u64,
        coordinates: &[f64],
        tags: &[String],
        lod_range: LodRange,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let geometry = decode_coordinates(coordinates)?;
        let tags = decode_pairs(tags, "element tags")?;
        let element = Element::flat(id, geometry, tags);

        let mut state = self.lock_for_data("add_data_in_element")?;
        state.stats.element_imports += 1;
        let store = state.store_mut(key)?;
        for level_of_detail in lod_range.levels() {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            store.index(&element, level_of_detail);
        }
        Ok(())
    }

    fn has_data(&self, quad_key: QuadKey) -> bool {
        self.lock()
            .stores
            .values()
            .any(|store| store.tiles.contains_key(&quad_key))
    }

    fn get_data_by_quad_key(
        &self,
        style: &Path,
        quad_key: QuadKey,
        elevation: ElevationDataType,
        sink: &mut dyn GatewaySink,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let elements = {
            let mut state = self.lock_for_data("get_data_by_quad_key")?;
            if !state.stylesheets.contains(style) {
                return Err(MapDataError::Engine(format!(
                    "Stylesheet '{}' is not registered",
                    style.display()
                )));
            }
            state.stats.tile_requests += 1;
            state.elements_at(&quad_key)
        };

        if cancellation.is_cancelled() {
            return Ok(());
        }
        sink.on_mesh_built(self.terrain_mesh(quad_key, elevation)?);

        for element in elements.values() {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let heights = element
                .geometry()
                .iter()
                .map(|coordinate| self.height(elevation, coordinate))
                .collect::<Result<Vec<_>>>()?;
            let styled = element.with_rendering(heights, resolve_styles(element.tags(), style))?;
            sink.on_element_loaded(encode_element(&styled));
        }

        Ok(())
    }

    fn get_data_by_text(
        &self,
        query: &MapQuery,
        sink: &mut dyn GatewaySink,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let matches = {
            let mut state = self.lock_for_data("get_data_by_text")?;
            state.stats.text_requests += 1;

            let mut matches = BTreeMap::new();
            for store in state.stores.values() {
                for (quad_key, tile) in &store.tiles {
                    if !query.lod_range.contains(quad_key.level_of_detail)
                        || !quad_key.bounding_box().intersects(&query.bounding_box)
                    {
                        continue;
                    }
                    for (id, element) in tile {
                        if matches.contains_key(id) {
                            continue;
                        }
                        let in_area = element
                            .bounding_box()
                            .is_some_and(|bbox: BoundingBox| bbox.intersects(&query.bounding_box));
                        if in_area && matches_query(element, query) {
                            matches.insert(*id, element.clone());
                        }
                    }
                }
            }
            matches
        };

        for element in matches.values() {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            sink.on_element_loaded(encode_element(element));
        }

        Ok(())
    }

    fn get_elevation(
        &self,
        _quad_key: QuadKey,
        elevation: ElevationDataType,
        coordinate: GeoCoordinate,
    ) -> Result<f64> {
        self.lock_for_data("get_elevation")?.stats.elevation_requests += 1;
        self.height(elevation, &coordinate)
    }
}
