use super::super::resources::{MapDataInbox, TileLoadQueue};
use super::super::{LoadingTask, MapDataMessage, TileLoadProgressMessage, TileLoading};
use bevy::{
    prelude::*,
    tasks::{block_on, futures_lite::future},
};

/// System to apply the results of finished loading tasks
pub fn handle_completed_tasks(
    mut commands: Commands,
    mut queue: ResMut<TileLoadQueue>,
    mut loading_tasks: Query<(Entity, &mut LoadingTask)>,
) {
    let mut completed = Vec::new();

    for (entity, mut loading_task) in &mut loading_tasks {
        if let Some(mut commands_queue) = block_on(future::poll_once(&mut loading_task.task)) {
            // Deferred: messages and entity updates written by the task
            commands.append(&mut commands_queue);
            commands.entity(entity).despawn();
            completed.push(loading_task.request.quad_key);
        }
    }

    for quad_key in completed {
        queue.active.remove(&quad_key);
    }
}

/// System to republish buffered broker pushes as messages
pub fn forward_broker_output(
    inbox: Res<MapDataInbox>,
    mut data_events: MessageWriter<MapDataMessage>,
    mut progress_events: MessageWriter<TileLoadProgressMessage>,
    mut loading: Query<&mut TileLoading>,
) {
    for data in inbox.take_map_data() {
        data_events.write(MapDataMessage { data });
    }

    for update in inbox.take_progress() {
        for mut state in &mut loading {
            if state.request.quad_key == update.quad_key {
                state.stage = update.progress.stage;
                state.progress = update.progress.progress;
            }
        }
        progress_events.write(TileLoadProgressMessage {
            quad_key: update.quad_key,
            stage: update.progress.stage,
            progress: update.progress.progress,
        });
    }
}
