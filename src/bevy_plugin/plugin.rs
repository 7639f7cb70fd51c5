use bevy::prelude::*;
use std::sync::Arc;

use super::{
    LoadTileMessage, MapDataMessage, TileLoadFailedMessage, TileLoadProgressMessage,
    TileLoadedMessage, resources::*, systems::*,
};
use crate::MapDataBroker;

/// Bevy plugin that loads tiles through a [`MapDataBroker`].
///
/// The broker must be configured before tiles are requested.
pub struct MapDataPlugin {
    broker: Arc<MapDataBroker>,
    max_concurrent_loads: usize,
}

impl MapDataPlugin {
    pub fn new(broker: Arc<MapDataBroker>) -> Self {
        Self {
            broker,
            max_concurrent_loads: 2,
        }
    }

    /// Set maximum concurrent loading operations
    pub fn with_max_concurrent_loads(mut self, max: usize) -> Self {
        self.max_concurrent_loads = max;
        self
    }
}

impl Plugin for MapDataPlugin {
    fn build(&self, app: &mut App) {
        app
            // Resources
            .insert_resource(TileLoadQueue::new(self.max_concurrent_loads))
            .insert_resource(MapBroker(self.broker.clone()))
            .insert_resource(MapDataInbox::attach(&self.broker))
            // Messages (buffered events)
            .add_message::<LoadTileMessage>()
            .add_message::<TileLoadedMessage>()
            .add_message::<TileLoadFailedMessage>()
            .add_message::<TileLoadProgressMessage>()
            .add_message::<MapDataMessage>()
            // Systems
            .add_systems(
                Update,
                (
                    handle_tile_requests,
                    process_tile_tasks,
                    handle_completed_tasks,
                    forward_broker_output,
                )
                    .chain(),
            );
    }
}
