use super::TileLoadRequest;
use crate::{MapData, MapDataBroker, QuadKey, Subscription, TileProgress};
use bevy::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Resource managing the tile loading queue
#[derive(Resource)]
pub struct TileLoadQueue {
    pub pending: VecDeque<TileLoadRequest>,
    pub active: HashMap<QuadKey, Entity>, // quad key -> entity with LoadingTask
    pub max_concurrent: usize,
}

impl TileLoadQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            active: HashMap::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }
}

/// The broker shared by every loading task
#[derive(Resource, Clone)]
pub struct MapBroker(pub Arc<MapDataBroker>);

/// Buffers broker pushes until the next frame forwards them as messages
#[derive(Resource)]
pub struct MapDataInbox {
    map_data: Arc<Mutex<Vec<MapData>>>,
    progress: Arc<Mutex<Vec<TileProgress>>>,
    _subscriptions: Vec<Subscription>,
}

impl MapDataInbox {
    /// Subscribe to map data and progress pushes of `broker`
    pub fn attach(broker: &MapDataBroker) -> Self {
        let map_data = Arc::new(Mutex::new(Vec::new()));
        let progress = Arc::new(Mutex::new(Vec::new()));

        let data_buffer = map_data.clone();
        let progress_buffer = progress.clone();
        let subscriptions = vec![
            broker.subscribe_map_data(move |data: &MapData| {
                data_buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(data.clone());
            }),
            broker.subscribe_progress(move |update: &TileProgress| {
                progress_buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(*update);
            }),
        ];

        Self {
            map_data,
            progress,
            _subscriptions: subscriptions,
        }
    }

    pub fn take_map_data(&self) -> Vec<MapData> {
        std::mem::take(&mut *self.map_data.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn take_progress(&self) -> Vec<TileProgress> {
        std::mem::take(&mut *self.progress.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
