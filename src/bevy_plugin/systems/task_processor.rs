use super::super::resources::{MapBroker, TileLoadQueue};
use super::super::{
    LoadedTile, LoadingTask, TileLoadFailedMessage, TileLoadRequest, TileLoadedMessage, TileLoading,
};
use crate::{MapDataBroker, Result, Tile};
use bevy::{
    ecs::{system::SystemState, world::CommandQueue},
    platform::time::Instant,
    prelude::*,
    tasks::AsyncComputeTaskPool,
};
use std::sync::Arc;

/// System to start queued tile loads on the AsyncComputeTaskPool
pub fn process_tile_tasks(
    mut queue: ResMut<TileLoadQueue>,
    broker: Res<MapBroker>,
    mut commands: Commands,
) {
    let thread_pool = AsyncComputeTaskPool::get();

    while queue.active.len() < queue.max_concurrent {
        let Some(request) = queue.pending.pop_front() else {
            break;
        };
        let quad_key = request.quad_key;

        // One task per tile
        if queue.active.contains_key(&quad_key) {
            tracing::debug!("Tile {} is already loading, dropping duplicate request", quad_key);
            continue;
        }

        let broker = broker.0.clone();
        let request_clone = request.clone();

        let task = thread_pool.spawn(async move {
            let result = load_tile_async(&broker, &request_clone).await;

            let mut command_queue = CommandQueue::default();
            command_queue.push(move |world: &mut World| {
                let mut system_state = SystemState::<(
                    MessageWriter<TileLoadedMessage>,
                    MessageWriter<TileLoadFailedMessage>,
                    Query<&mut TileLoading>,
                    Commands,
                )>::new(world);

                let (mut loaded_events, mut failed_events, mut loading_query, mut commands) =
                    system_state.get_mut(world);

                match result {
                    Ok(()) => {
                        loaded_events.write(TileLoadedMessage {
                            request: request_clone.clone(),
                            entity: request_clone.target_entity,
                        });

                        if let Some(target_entity) = request_clone.target_entity {
                            if loading_query.get_mut(target_entity).is_ok() {
                                commands
                                    .entity(target_entity)
                                    .remove::<TileLoading>()
                                    .insert(LoadedTile {
                                        request: request_clone,
                                        loaded_at: Instant::now(),
                                    });
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            "Loading tile {} failed: {}",
                            request_clone.quad_key,
                            error
                        );
                        failed_events.write(TileLoadFailedMessage {
                            request: request_clone.clone(),
                            error: error.to_string(),
                        });

                        if let Some(target_entity) = request_clone.target_entity {
                            commands.entity(target_entity).remove::<TileLoading>();
                        }
                    }
                }

                system_state.apply(world);
            });

            command_queue
        });

        let task_entity = commands
            .spawn(LoadingTask {
                request,
                task,
                started_at: Instant::now(),
            })
            .id();

        queue.active.insert(quad_key, task_entity);
    }
}

async fn load_tile_async(broker: &Arc<MapDataBroker>, request: &TileLoadRequest) -> Result<()> {
    let tile = Tile::new(request.quad_key, request.stylesheet.clone())
        .with_elevation(request.elevation);
    broker.load_tile(tile).await?;
    Ok(())
}
