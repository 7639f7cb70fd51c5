//! The map data broker: routes requests to the engine and fans decoded
//! results out to subscribers.

mod observer;
mod progress;
mod session;
mod sink;
#[cfg(test)]
mod tests;

pub use observer::*;
pub use progress::*;
pub use session::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sink::{ElementSink, TileSink};

use crate::gateway::{EngineGateway, flatten_element};
use crate::source::TileDataSource;
use crate::{
    BrokerConfig, CancellationToken, Element, ElevationDataType, GeoCoordinate, LodRange, MapData,
    MapDataError, MapQuery, QuadKey, Result, Stylesheet, Tile,
};

/// Where imported data is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTarget {
    /// Every tile the data touches, for each level in the range
    Range(LodRange),
    /// Only the given tile
    QuadKey(QuadKey),
}

fn ensure_not_cancelled(cancellation: &CancellationToken) -> Result<()> {
    if cancellation.is_cancelled() {
        Err(MapDataError::Cancelled)
    } else {
        Ok(())
    }
}

/// Single entry point for map data.
///
/// Requests are validated against the broker's [`EngineSession`], handed to
/// the engine with a sink that decodes payloads, and every decoded result is
/// pushed to the matching listeners in the order the engine produced it.
pub struct MapDataBroker {
    gateway: Arc<dyn EngineGateway>,
    data_source: Option<Arc<dyn TileDataSource>>,
    session: EngineSession,
    map_data: ListenerRegistry<MapData>,
    tiles: ListenerRegistry<Tile>,
    elements: ListenerRegistry<Element>,
    progress: ListenerRegistry<TileProgress>,
}

impl MapDataBroker {
    pub fn new(gateway: Arc<dyn EngineGateway>) -> Self {
        Self {
            gateway,
            data_source: None,
            session: EngineSession::new(),
            map_data: ListenerRegistry::new(),
            tiles: ListenerRegistry::new(),
            elements: ListenerRegistry::new(),
            progress: ListenerRegistry::new(),
        }
    }

    /// Fetch missing tile data from `source` before building tiles
    pub fn with_data_source(mut self, source: Arc<dyn TileDataSource>) -> Self {
        self.data_source = Some(source);
        self
    }

    pub fn gateway(&self) -> &Arc<dyn EngineGateway> {
        &self.gateway
    }

    pub fn is_configured(&self) -> bool {
        self.session.is_configured()
    }

    /// The active configuration, `None` before [`configure`](Self::configure)
    pub fn config(&self) -> Option<BrokerConfig> {
        self.session.config().ok()
    }

    /// Validate `config`, connect the engine and register the download storage.
    ///
    /// Only the first successful call has an effect.
    pub fn configure(&self, config: BrokerConfig) -> Result<()> {
        let configured = self.session.configure_once(config, |config| {
            config.validate()?;

            tracing::info!(
                "Connecting {} engine to index {}",
                self.gateway.engine_name(),
                config.index_path.display()
            );
            self.gateway.connect(&config.index_path)?;
            self.gateway.enable_mesh_cache(config.mesh_cache);
            self.gateway
                .register_in_memory_store(&config.download_storage)?;
            Ok(())
        })?;

        if configured {
            let config = self.session.config()?;
            self.session.add_storage(&config.download_storage);
        } else {
            tracing::debug!("Broker already configured, ignoring configure call");
        }
        Ok(())
    }

    /// Disconnect the engine and forget every registration
    pub fn disconnect(&self) {
        if self.session.is_configured() {
            tracing::info!("Disconnecting {} engine", self.gateway.engine_name());
            self.gateway.disconnect();
            self.session.reset();
        }
    }

    pub fn register_in_memory_storage(&self, key: &str) -> Result<()> {
        self.session.config()?;
        self.gateway.register_in_memory_store(key)?;
        self.session.add_storage(key);
        tracing::info!("Registered in-memory storage '{}'", key);
        Ok(())
    }

    /// Register a storage persisted under `path`, relative to the asset root
    pub fn register_persistent_storage(&self, key: &str, path: &Path) -> Result<()> {
        let config = self.session.config()?;
        let path = config.resolve_path(path)?;
        self.gateway.register_persistent_store(key, &path)?;
        self.session.add_storage(key);
        tracing::info!("Registered persistent storage '{}' at {}", key, path.display());
        Ok(())
    }

    /// Resolve a stylesheet and register it with the engine on first use
    fn ensure_stylesheet(&self, config: &BrokerConfig, stylesheet: &Stylesheet) -> Result<PathBuf> {
        let path = config.resolve_path(stylesheet.path())?;
        let registered = self
            .session
            .register_stylesheet_once(&path, |path| self.gateway.register_stylesheet(path))?;
        if registered {
            tracing::info!("Registered stylesheet {}", path.display());
        }
        Ok(path)
    }

    fn report(&self, quad_key: QuadKey, stage: LoadingStage) {
        self.progress.emit(&TileProgress {
            quad_key,
            progress: LoadProgress::new(stage),
        });
    }

    /// Load a tile, downloading and ingesting its data first when the engine
    /// has none and a data source is configured.
    ///
    /// Meshes and elements go to map data listeners as they are decoded; the
    /// tile itself goes to tile listeners once it is complete.
    pub async fn load_tile(&self, tile: Tile) -> Result<LoadProgress> {
        let config = self.session.config()?;
        let quad_key = tile.quad_key;
        quad_key.validate()?;
        ensure_not_cancelled(&tile.cancellation)?;

        let style = self.ensure_stylesheet(&config, &tile.stylesheet)?;

        let missing_source = match &self.data_source {
            Some(source) if !self.gateway.has_data(quad_key) => Some(source.clone()),
            _ => None,
        };
        if let Some(source) = missing_source {
            self.session.require_storage(&config.download_storage)?;

            self.report(quad_key, LoadingStage::Downloading);
            tracing::info!(
                "Tile {} has no data, fetching it from {} source",
                quad_key,
                source.source_type()
            );
            let data_file = source.fetch_tile_data(quad_key).await?;
            ensure_not_cancelled(&tile.cancellation)?;

            if let Some(data_file) = data_file {
                self.report(quad_key, LoadingStage::Importing);
                tracing::debug!(
                    "Importing {} into storage '{}'",
                    data_file.path.display(),
                    config.download_storage
                );
                self.gateway.add_data_in_quad_key(
                    &config.download_storage,
                    &style,
                    &data_file.path,
                    quad_key,
                    &tile.cancellation,
                )?;
                ensure_not_cancelled(&tile.cancellation)?;
            } else {
                tracing::debug!("No data available for tile {}", quad_key);
            }
        }

        self.report(quad_key, LoadingStage::Loading);
        let mut sink = TileSink::new(&tile, &self.map_data);
        self.gateway.get_data_by_quad_key(
            &style,
            quad_key,
            tile.elevation_type,
            &mut sink,
            &tile.cancellation,
        )?;
        let (meshes, elements) = sink.finish()?;
        ensure_not_cancelled(&tile.cancellation)?;

        tracing::debug!(
            "Loaded tile {}: {} meshes, {} elements",
            quad_key,
            meshes,
            elements
        );
        self.tiles.emit(&tile);
        self.report(quad_key, LoadingStage::Complete);
        Ok(LoadProgress::complete())
    }

    /// Run a search; matching elements go to element listeners
    pub fn submit_query(&self, query: &MapQuery, cancellation: &CancellationToken) -> Result<usize> {
        self.session.config()?;
        query.lod_range.validate()?;
        ensure_not_cancelled(cancellation)?;

        tracing::debug!(
            "Searching '{}' (or '{}', not '{}') in {:?}",
            query.and_terms,
            query.or_terms,
            query.not_terms,
            query.bounding_box
        );

        let mut sink = ElementSink::new(&self.elements);
        self.gateway.get_data_by_text(query, &mut sink, cancellation)?;
        let found = sink.finish()?;
        ensure_not_cancelled(cancellation)?;
        Ok(found)
    }

    /// Import a data file into `storage`.
    ///
    /// For [`DataTarget::QuadKey`] nothing is imported when the engine
    /// already has data for that tile. Progress is not reported
    /// incrementally; the result is always complete.
    pub fn add_data(
        &self,
        storage: &str,
        path: &Path,
        stylesheet: &Stylesheet,
        target: DataTarget,
        cancellation: &CancellationToken,
    ) -> Result<LoadProgress> {
        let config = self.session.config()?;
        match target {
            DataTarget::Range(lod_range) => lod_range.validate()?,
            DataTarget::QuadKey(quad_key) => quad_key.validate()?,
        }
        self.session.require_storage(storage)?;
        ensure_not_cancelled(cancellation)?;

        if let DataTarget::QuadKey(quad_key) = target {
            if self.gateway.has_data(quad_key) {
                tracing::debug!("Tile {} already has data, skipping import", quad_key);
                return Ok(LoadProgress::complete());
            }
        }

        let style = self.ensure_stylesheet(&config, stylesheet)?;
        let data = config.resolve_path(path)?;

        tracing::info!("Importing {} into storage '{}'", data.display(), storage);
        match target {
            DataTarget::Range(lod_range) => {
                self.gateway
                    .add_data_in_range(storage, &style, &data, lod_range, cancellation)?;
            }
            DataTarget::QuadKey(quad_key) => {
                self.gateway
                    .add_data_in_quad_key(storage, &style, &data, quad_key, cancellation)?;
            }
        }

        ensure_not_cancelled(cancellation)?;
        Ok(LoadProgress::complete())
    }

    /// Import a single element into `storage`
    pub fn add_element(
        &self,
        storage: &str,
        element: &Element,
        stylesheet: &Stylesheet,
        lod_range: LodRange,
        cancellation: &CancellationToken,
    ) -> Result<LoadProgress> {
        let config = self.session.config()?;
        lod_range.validate()?;
        self.session.require_storage(storage)?;
        ensure_not_cancelled(cancellation)?;

        let style = self.ensure_stylesheet(&config, stylesheet)?;
        let flat = flatten_element(element);

        tracing::debug!("Adding element {} to storage '{}'", element.id(), storage);
        self.gateway.add_data_in_element(
            storage,
            &style,
            element.id(),
            &flat.coordinates,
            &flat.tags,
            lod_range,
            cancellation,
        )?;

        ensure_not_cancelled(cancellation)?;
        Ok(LoadProgress::complete())
    }

    /// Height in meters at `coordinate`
    pub fn elevation_at(
        &self,
        elevation: ElevationDataType,
        quad_key: QuadKey,
        coordinate: GeoCoordinate,
    ) -> Result<f64> {
        self.session.config()?;
        quad_key.validate()?;
        self.gateway.get_elevation(quad_key, elevation, coordinate)
    }

    /// Whether the engine holds data for the tile; `false` before configuration
    /// and for invalid quadkeys
    pub fn has_data(&self, quad_key: QuadKey) -> bool {
        self.session.is_configured() && quad_key.validate().is_ok() && self.gateway.has_data(quad_key)
    }

    /// Receive every mesh and element decoded while loading tiles
    pub fn subscribe_map_data(
        &self,
        listener: impl Fn(&MapData) + Send + Sync + 'static,
    ) -> Subscription {
        self.map_data.subscribe(listener)
    }

    /// Receive each tile once it finished loading
    pub fn subscribe_tiles(&self, listener: impl Fn(&Tile) + Send + Sync + 'static) -> Subscription {
        self.tiles.subscribe(listener)
    }

    /// Receive every element found by searches
    pub fn subscribe_elements(
        &self,
        listener: impl Fn(&Element) + Send + Sync + 'static,
    ) -> Subscription {
        self.elements.subscribe(listener)
    }

    /// Receive stage changes of tile loads
    pub fn subscribe_progress(
        &self,
        listener: impl Fn(&TileProgress) + Send + Sync + 'static,
    ) -> Subscription {
        self.progress.subscribe(listener)
    }
}

impl std::fmt::Debug for MapDataBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapDataBroker")
            .field("engine", &self.gateway.engine_name())
            .field("configured", &self.is_configured())
            .field("data_source", &self.data_source.as_ref().map(|s| s.source_type()))
            .finish()
    }
}
