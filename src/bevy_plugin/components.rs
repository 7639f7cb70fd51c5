use super::TileLoadRequest;
use crate::LoadingStage;
use bevy::{ecs::world::CommandQueue, platform::time::Instant, prelude::*, tasks::Task};

/// Marks an entity whose tile finished loading
#[derive(Component, Debug)]
pub struct LoadedTile {
    pub request: TileLoadRequest,
    pub loaded_at: Instant,
}

/// Component indicating a tile is currently being loaded
#[derive(Component, Debug)]
pub struct TileLoading {
    pub request: TileLoadRequest,
    pub stage: LoadingStage,
    pub progress: f32,
    pub started_at: Instant,
}

/// Async load running on the compute pool
#[derive(Component)]
pub struct LoadingTask {
    pub request: TileLoadRequest,
    pub task: Task<CommandQueue>,
    pub started_at: Instant,
}
