use async_trait::async_trait;
use std::path::PathBuf;

use super::{DataFile, DataFileMetadata, SourceCapabilities, TileDataSource};
use crate::{MapDataError, QuadKey, Result};

/// Source reading pre-downloaded files named `<quadkey>.json` from a directory
pub struct FileSource {
    directory: PathBuf,
}

impl FileSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Where the file for `quad_key` is expected
    pub fn path_for(&self, quad_key: QuadKey) -> PathBuf {
        self.directory.join(format!("{}.json", quad_key))
    }
}

#[async_trait]
impl TileDataSource for FileSource {
    fn source_type(&self) -> &'static str {
        "file"
    }

    async fn fetch_tile_data(&self, quad_key: QuadKey) -> Result<Option<DataFile>> {
        let path = self.path_for(quad_key);
        let size = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            _ => {
                tracing::debug!("No data file for tile {} at {}", quad_key, path.display());
                return Ok(None);
            }
        };

        let metadata = DataFileMetadata::new(self.directory.display().to_string(), self.source_type())
            .with_extra("file_size", size.to_string());

        Ok(Some(DataFile {
            path,
            quad_key,
            metadata,
        }))
    }

    async fn test_availability(&self) -> Result<()> {
        if self.directory.is_dir() {
            Ok(())
        } else {
            Err(MapDataError::Config(format!(
                "Data directory not found: {}",
                self.directory.display()
            )))
        }
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            wasm_compatible: false,
            notes: Some("Local pre-downloaded tile files".to_string()),
            ..Default::default()
        }
    }
}
