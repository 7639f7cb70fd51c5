use super::ListenerRegistry;
use crate::gateway::{GatewaySink, RawElement, RawMesh, decode_element, decode_mesh};
use crate::{Element, MapData, MapDataError, MapDataKind, Result, Tile};

/// Decodes tile payloads and pushes them to map data listeners as they arrive.
///
/// The first decoding failure is kept and reported once the engine call
/// returns; later payloads of the same call are dropped.
pub(crate) struct TileSink<'a> {
    tile: &'a Tile,
    listeners: &'a ListenerRegistry<MapData>,
    error: Option<MapDataError>,
    pub meshes: usize,
    pub elements: usize,
}

impl<'a> TileSink<'a> {
    pub fn new(tile: &'a Tile, listeners: &'a ListenerRegistry<MapData>) -> Self {
        Self {
            tile,
            listeners,
            error: None,
            meshes: 0,
            elements: 0,
        }
    }

    pub fn finish(self) -> Result<(usize, usize)> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.meshes, self.elements)),
        }
    }

    fn push(&self, kind: MapDataKind) {
        self.listeners.emit(&MapData {
            tile: self.tile.clone(),
            kind,
        });
    }
}

impl GatewaySink for TileSink<'_> {
    fn on_mesh_built(&mut self, mesh: RawMesh) {
        if self.error.is_some() {
            return;
        }
        match decode_mesh(mesh, &self.tile.projection) {
            Ok(mesh) => {
                self.meshes += 1;
                self.push(MapDataKind::Mesh(mesh));
            }
            Err(error) => self.error = Some(error),
        }
    }

    fn on_element_loaded(&mut self, element: RawElement) {
        if self.error.is_some() {
            return;
        }
        match decode_element(element) {
            Ok(element) => {
                self.elements += 1;
                self.push(MapDataKind::Element(element));
            }
            Err(error) => self.error = Some(error),
        }
    }
}

/// Decodes search results and pushes them to element listeners
pub(crate) struct ElementSink<'a> {
    listeners: &'a ListenerRegistry<Element>,
    error: Option<MapDataError>,
    pub elements: usize,
}

impl<'a> ElementSink<'a> {
    pub fn new(listeners: &'a ListenerRegistry<Element>) -> Self {
        Self {
            listeners,
            error: None,
            elements: 0,
        }
    }

    pub fn finish(self) -> Result<usize> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.elements),
        }
    }
}

impl GatewaySink for ElementSink<'_> {
    fn on_mesh_built(&mut self, mesh: RawMesh) {
        tracing::debug!("Ignoring mesh '{}' delivered for a search", mesh.name);
    }

    fn on_element_loaded(&mut self, element: RawElement) {
        if self.error.is_some() {
            return;
        }
        match decode_element(element) {
            Ok(element) => {
                self.elements += 1;
                self.listeners.emit(&element);
            }
            Err(error) => self.error = Some(error),
        }
    }
}
