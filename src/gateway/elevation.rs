use grid::Grid;

use crate::{BoundingBox, GeoCoordinate, MapDataError, Result};

/// Regular height grid covering a bounding box.
///
/// Row 0 is the northern edge and column 0 the western edge. Heights are
/// interpolated bilinearly between samples.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    bounds: BoundingBox,
    heights: Grid<f64>,
}

impl ElevationGrid {
    /// Create a grid from row-major samples, north row first
    pub fn new(bounds: BoundingBox, columns: usize, samples: Vec<f64>) -> Result<Self> {
        if columns < 2 || samples.len() < 2 * columns || samples.len() % columns != 0 {
            return Err(MapDataError::Config(format!(
                "Elevation grid needs at least 2x2 samples in full rows, got {} samples for {} columns",
                samples.len(),
                columns
            )));
        }
        if bounds.height() <= 0.0 || bounds.width() <= 0.0 {
            return Err(MapDataError::Geographic(format!(
                "Elevation grid bounds are empty: {:?}",
                bounds
            )));
        }

        Ok(Self {
            bounds,
            heights: Grid::from_vec(samples, columns),
        })
    }

    /// A grid where every sample has the same height
    pub fn constant(bounds: BoundingBox, height: f64) -> Result<Self> {
        Self::new(bounds, 2, vec![height; 4])
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Height at a coordinate, `None` outside the grid
    pub fn sample(&self, coordinate: &GeoCoordinate) -> Option<f64> {
        if !self.bounds.contains(coordinate) {
            return None;
        }

        let rows = self.heights.rows();
        let cols = self.heights.cols();

        let fx = (coordinate.longitude - self.bounds.west) / self.bounds.width() * (cols - 1) as f64;
        let fy = (self.bounds.north - coordinate.latitude) / self.bounds.height() * (rows - 1) as f64;

        let x0 = (fx.floor() as usize).min(cols - 2);
        let y0 = (fy.floor() as usize).min(rows - 2);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let h00 = *self.heights.get(y0, x0)?;
        let h10 = *self.heights.get(y0, x0 + 1)?;
        let h01 = *self.heights.get(y0 + 1, x0)?;
        let h11 = *self.heights.get(y0 + 1, x0 + 1)?;

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        Some(top + (bottom - top) * ty)
    }
}
