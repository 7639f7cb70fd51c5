use crate::{ElevationDataType, LoadingStage, MapData, QuadKey, Stylesheet};
use bevy::prelude::*;

/// Message to request loading a tile
#[derive(Message, Clone, Debug)]
pub struct LoadTileMessage {
    pub request: TileLoadRequest,
}

/// What to load and where to report it
#[derive(Clone, Debug)]
pub struct TileLoadRequest {
    pub quad_key: QuadKey,
    pub stylesheet: Stylesheet,
    pub elevation: ElevationDataType,
    pub target_entity: Option<Entity>,
}

impl TileLoadRequest {
    pub fn new(quad_key: QuadKey, stylesheet: Stylesheet) -> Self {
        Self {
            quad_key,
            stylesheet,
            elevation: ElevationDataType::Flat,
            target_entity: None,
        }
    }

    /// Sample heights from the given elevation source
    pub fn with_elevation(mut self, elevation: ElevationDataType) -> Self {
        self.elevation = elevation;
        self
    }

    /// Track loading state on a specific entity
    pub fn for_entity(mut self, entity: Entity) -> Self {
        self.target_entity = Some(entity);
        self
    }
}

/// Sent once the broker finished loading a tile
#[derive(Message, Debug)]
pub struct TileLoadedMessage {
    pub request: TileLoadRequest,
    pub entity: Option<Entity>,
}

#[derive(Message, Debug)]
pub struct TileLoadFailedMessage {
    pub request: TileLoadRequest,
    pub error: String,
}

/// Stage change of a tile load
#[derive(Message, Debug, Clone)]
pub struct TileLoadProgressMessage {
    pub quad_key: QuadKey,
    pub stage: LoadingStage,
    pub progress: f32, // 0.0 to 1.0
}

/// A mesh or element pushed by the broker
#[derive(Message, Debug, Clone)]
pub struct MapDataMessage {
    pub data: MapData,
}

/// Helper trait for requesting tiles
pub trait TileLoadingExt {
    fn load_tile(&mut self, quad_key: QuadKey, stylesheet: Stylesheet) -> TileLoadRequest;

    fn load_tile_with_request(&mut self, request: TileLoadRequest);
}

impl TileLoadingExt for MessageWriter<'_, LoadTileMessage> {
    fn load_tile(&mut self, quad_key: QuadKey, stylesheet: Stylesheet) -> TileLoadRequest {
        let request = TileLoadRequest::new(quad_key, stylesheet);
        self.write(LoadTileMessage {
            request: request.clone(),
        });
        request
    }

    fn load_tile_with_request(&mut self, request: TileLoadRequest) {
        self.write(LoadTileMessage { request });
    }
}
