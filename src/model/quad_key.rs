//! Quadtree tile addressing

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::{BoundingBox, GeoCoordinate, MapDataError};

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Deepest level of detail that still fits a quadkey string in 23 digits
pub const MAX_LEVEL_OF_DETAIL: u8 = 23;

/// Address of a tile in the Web Mercator quadtree.
///
/// `tile_x` grows eastwards and `tile_y` southwards; both are in
/// `0..2^level_of_detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuadKey {
    pub tile_x: u32,
    pub tile_y: u32,
    pub level_of_detail: u8,
}

impl QuadKey {
    pub fn new(tile_x: u32, tile_y: u32, level_of_detail: u8) -> Self {
        Self {
            tile_x,
            tile_y,
            level_of_detail,
        }
    }

    /// Build a quadkey, rejecting levels above [`MAX_LEVEL_OF_DETAIL`] and
    /// tiles outside the grid
    pub fn try_new(tile_x: u32, tile_y: u32, level_of_detail: u8) -> crate::Result<Self> {
        let quad_key = Self::new(tile_x, tile_y, level_of_detail);
        quad_key.validate()?;
        Ok(quad_key)
    }

    /// Check the level of detail and that both tile indices are in `0..2^level_of_detail`
    pub fn validate(&self) -> crate::Result<()> {
        if self.level_of_detail > MAX_LEVEL_OF_DETAIL {
            return Err(MapDataError::Geographic(format!(
                "Level of detail {} is above the maximum of {}",
                self.level_of_detail, MAX_LEVEL_OF_DETAIL
            )));
        }
        let n = Self::tiles_per_axis(self.level_of_detail);
        if self.tile_x >= n || self.tile_y >= n {
            return Err(MapDataError::Geographic(format!(
                "Tile ({}, {}) is outside the {}x{} grid of level {}",
                self.tile_x, self.tile_y, n, n, self.level_of_detail
            )));
        }
        Ok(())
    }

    /// Number of tiles along one axis at this level of detail.
    ///
    /// Levels above [`MAX_LEVEL_OF_DETAIL`] are treated as that level.
    pub fn tiles_per_axis(level_of_detail: u8) -> u32 {
        1u32 << level_of_detail.min(MAX_LEVEL_OF_DETAIL)
    }

    /// Find the tile containing a coordinate. Latitudes are clamped to the
    /// Mercator range and longitude 180 maps to the last column.
    pub fn from_coordinate(coordinate: GeoCoordinate, level_of_detail: u8) -> Self {
        let n = f64::from(Self::tiles_per_axis(level_of_detail));
        let max_index = Self::tiles_per_axis(level_of_detail) - 1;

        let lat = coordinate.latitude.clamp(MIN_LAT, MAX_LAT);
        let lon = coordinate.longitude.clamp(-180.0, 180.0);

        let x = ((lon + 180.0) / 360.0 * n).floor();
        let lat_rad = lat.to_radians();
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

        Self::new(
            (x.max(0.0) as u32).min(max_index),
            (y.max(0.0) as u32).min(max_index),
            level_of_detail,
        )
    }

    /// Geographic extent of this tile
    pub fn bounding_box(&self) -> BoundingBox {
        let n = f64::from(Self::tiles_per_axis(self.level_of_detail));
        let lon_at = |x: f64| x / n * 360.0 - 180.0;
        let lat_at = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

        let x = f64::from(self.tile_x);
        let y = f64::from(self.tile_y);

        BoundingBox::new(lat_at(y + 1.0), lon_at(x), lat_at(y), lon_at(x + 1.0))
    }

    /// The tile one level up that contains this one
    pub fn parent(&self) -> Option<QuadKey> {
        if self.level_of_detail == 0 {
            return None;
        }
        Some(Self::new(
            self.tile_x / 2,
            self.tile_y / 2,
            self.level_of_detail - 1,
        ))
    }

    /// The four tiles one level down, in quadkey digit order; `None` from
    /// [`MAX_LEVEL_OF_DETAIL`] on
    pub fn children(&self) -> Option<[QuadKey; 4]> {
        if self.level_of_detail >= MAX_LEVEL_OF_DETAIL {
            return None;
        }
        let x = self.tile_x * 2;
        let y = self.tile_y * 2;
        let lod = self.level_of_detail + 1;
        Some([
            Self::new(x, y, lod),
            Self::new(x + 1, y, lod),
            Self::new(x, y + 1, lod),
            Self::new(x + 1, y + 1, lod),
        ])
    }

    /// All tiles at `level_of_detail` that overlap the given box
    pub fn covering(bbox: &BoundingBox, level_of_detail: u8) -> impl Iterator<Item = QuadKey> {
        let north_west = Self::from_coordinate(GeoCoordinate::new(bbox.north, bbox.west), level_of_detail);
        let south_east = Self::from_coordinate(GeoCoordinate::new(bbox.south, bbox.east), level_of_detail);

        (north_west.tile_y..=south_east.tile_y).flat_map(move |y| {
            (north_west.tile_x..=south_east.tile_x).map(move |x| Self::new(x, y, level_of_detail))
        })
    }

    /// Number of tiles `covering` would yield, without allocating them
    pub fn covering_count(bbox: &BoundingBox, level_of_detail: u8) -> u64 {
        let north_west = Self::from_coordinate(GeoCoordinate::new(bbox.north, bbox.west), level_of_detail);
        let south_east = Self::from_coordinate(GeoCoordinate::new(bbox.south, bbox.east), level_of_detail);

        let columns = u64::from(south_east.tile_x.saturating_sub(north_west.tile_x)) + 1;
        let rows = u64::from(south_east.tile_y.saturating_sub(north_west.tile_y)) + 1;
        columns * rows
    }
}

impl fmt::Display for QuadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in (1..=self.level_of_detail).rev() {
            let mask = 1u32.checked_shl(u32::from(level - 1)).unwrap_or(0);
            let mut digit = 0u8;
            if self.tile_x & mask != 0 {
                digit += 1;
            }
            if self.tile_y & mask != 0 {
                digit += 2;
            }
            write!(f, "{}", digit)?;
        }
        Ok(())
    }
}

impl FromStr for QuadKey {
    type Err = MapDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_LEVEL_OF_DETAIL as usize {
            return Err(MapDataError::Geographic(format!(
                "Quadkey '{}' is deeper than level {}",
                s, MAX_LEVEL_OF_DETAIL
            )));
        }

        let mut tile_x = 0u32;
        let mut tile_y = 0u32;
        for ch in s.chars() {
            tile_x <<= 1;
            tile_y <<= 1;
            match ch {
                '0' => {}
                '1' => tile_x |= 1,
                '2' => tile_y |= 1,
                '3' => {
                    tile_x |= 1;
                    tile_y |= 1;
                }
                _ => {
                    return Err(MapDataError::Geographic(format!(
                        "Invalid quadkey digit '{}' in '{}'",
                        ch, s
                    )));
                }
            }
        }

        Ok(Self::new(tile_x, tile_y, s.len() as u8))
    }
}
