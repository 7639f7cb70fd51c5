use super::super::resources::TileLoadQueue;
use super::super::{LoadTileMessage, TileLoading};
use crate::LoadingStage;
use bevy::{platform::time::Instant, prelude::*};

/// System to queue new tile load requests
pub fn handle_tile_requests(
    mut load_events: MessageReader<LoadTileMessage>,
    mut queue: ResMut<TileLoadQueue>,
    mut commands: Commands,
) {
    for event in load_events.read() {
        let request = event.request.clone();

        if let Some(entity) = request.target_entity {
            commands.entity(entity).insert(TileLoading {
                request: request.clone(),
                stage: LoadingStage::Downloading,
                progress: 0.0,
                started_at: Instant::now(),
            });
        }

        queue.pending.push_back(request);
    }
}
