use serde::{Deserialize, Serialize};

use crate::QuadKey;

/// Stage of a tile load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingStage {
    /// Fetching the tile's data file from a data source
    Downloading,
    /// Ingesting the data file into a storage
    Importing,
    /// Building the tile
    Loading,
    Complete,
}

impl LoadingStage {
    /// Overall progress when a stage begins
    pub fn progress(&self) -> f32 {
        match self {
            Self::Downloading => 0.0,
            Self::Importing => 0.4,
            Self::Loading => 0.6,
            Self::Complete => 1.0,
        }
    }
}

/// Progress of a load or import operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub stage: LoadingStage,
    /// Overall progress in `0.0..=1.0`
    pub progress: f32,
}

impl LoadProgress {
    pub fn new(stage: LoadingStage) -> Self {
        Self {
            stage,
            progress: stage.progress(),
        }
    }

    pub fn complete() -> Self {
        Self::new(LoadingStage::Complete)
    }

    pub fn is_complete(&self) -> bool {
        self.stage == LoadingStage::Complete
    }
}

/// Progress update for one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileProgress {
    pub quad_key: QuadKey,
    pub progress: LoadProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress_is_monotonic() {
        let stages = [
            LoadingStage::Downloading,
            LoadingStage::Importing,
            LoadingStage::Loading,
            LoadingStage::Complete,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
    }

    #[test]
    fn test_complete() {
        let progress = LoadProgress::complete();
        assert!(progress.is_complete());
        assert_eq!(progress.progress, 1.0);
        assert!(!LoadProgress::new(LoadingStage::Loading).is_complete());
    }
}
