use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{CancellationToken, QuadKey};
use crate::GeoCoordinate;

/// Mean earth radius used by the projections, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Rule file governing how raw map features become visual output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stylesheet {
    path: PathBuf,
}

impl Stylesheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Source of elevation data used when building tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElevationDataType {
    /// Every point at sea level
    #[default]
    Flat,
    /// SRTM height tiles
    Srtm,
    /// Regular height grid
    Grid,
}

impl ElevationDataType {
    /// Integer code used on the engine boundary
    pub fn code(&self) -> i32 {
        match self {
            Self::Flat => 0,
            Self::Srtm => 1,
            Self::Grid => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Flat),
            1 => Some(Self::Srtm),
            2 => Some(Self::Grid),
            _ => None,
        }
    }
}

/// Maps geographic positions into world space, y pointing up
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Local tangent plane around `origin`, in meters
    Cartesian { origin: GeoCoordinate },
    /// Sphere of the given radius centred at the world origin
    Spherical { radius: f64 },
}

impl Projection {
    pub fn cartesian(origin: GeoCoordinate) -> Self {
        Self::Cartesian { origin }
    }

    pub fn spherical(radius: f64) -> Self {
        Self::Spherical { radius }
    }

    /// Project a coordinate with a height above sea level to `[x, y, z]`
    pub fn project(&self, coordinate: GeoCoordinate, height: f64) -> [f64; 3] {
        match self {
            Self::Cartesian { origin } => {
                let x = (coordinate.longitude - origin.longitude).to_radians()
                    * EARTH_RADIUS_M
                    * origin.latitude.to_radians().cos();
                let z = (coordinate.latitude - origin.latitude).to_radians() * EARTH_RADIUS_M;
                [x, height, z]
            }
            Self::Spherical { radius } => {
                let r = radius + height;
                let lat = coordinate.latitude.to_radians();
                let lon = coordinate.longitude.to_radians();
                [
                    r * lat.cos() * lon.cos(),
                    r * lat.sin(),
                    r * lat.cos() * lon.sin(),
                ]
            }
        }
    }
}

/// One renderable unit of request
#[derive(Debug, Clone)]
pub struct Tile {
    pub quad_key: QuadKey,
    pub stylesheet: Stylesheet,
    pub elevation_type: ElevationDataType,
    pub projection: Projection,
    pub cancellation: CancellationToken,
}

impl Tile {
    /// Create a tile on flat terrain with a cartesian projection centred on the tile
    pub fn new(quad_key: QuadKey, stylesheet: Stylesheet) -> Self {
        let origin = quad_key.bounding_box().center();
        Self {
            quad_key,
            stylesheet,
            elevation_type: ElevationDataType::Flat,
            projection: Projection::cartesian(origin),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_elevation(mut self, elevation_type: ElevationDataType) -> Self {
        self.elevation_type = elevation_type;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_codes() {
        for kind in [
            ElevationDataType::Flat,
            ElevationDataType::Srtm,
            ElevationDataType::Grid,
        ] {
            assert_eq!(ElevationDataType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ElevationDataType::from_code(7), None);
    }

    #[test]
    fn test_cartesian_projection() {
        let origin = GeoCoordinate::new(52.0, 13.0);
        let projection = Projection::cartesian(origin);

        assert_eq!(projection.project(origin, 0.0), [0.0, 0.0, 0.0]);

        let north = projection.project(GeoCoordinate::new(52.001, 13.0), 5.0);
        assert!(north[0].abs() < 1e-9);
        assert_eq!(north[1], 5.0);
        // 0.001 degrees of latitude is about 111 meters
        assert!((north[2] - 111.19).abs() < 0.1);

        let east = projection.project(GeoCoordinate::new(52.0, 13.001), 0.0);
        assert!(east[0] > 60.0 && east[0] < 75.0);
    }

    #[test]
    fn test_spherical_projection() {
        let projection = Projection::spherical(EARTH_RADIUS_M);

        let equator = projection.project(GeoCoordinate::new(0.0, 0.0), 0.0);
        assert!((equator[0] - EARTH_RADIUS_M).abs() < 1e-6);
        assert!(equator[1].abs() < 1e-6);

        let pole = projection.project(GeoCoordinate::new(90.0, 0.0), 100.0);
        assert!((pole[1] - (EARTH_RADIUS_M + 100.0)).abs() < 1e-6);
    }

    #[test]
    fn test_tile_defaults() {
        let quad_key = QuadKey::new(8800, 5373, 14);
        let tile = Tile::new(quad_key, Stylesheet::new("default.mapcss"));

        assert_eq!(tile.elevation_type, ElevationDataType::Flat);
        assert!(!tile.is_cancelled());
        match tile.projection {
            Projection::Cartesian { origin } => {
                assert!(quad_key.bounding_box().contains(&origin));
            }
            _ => panic!("Expected cartesian projection"),
        }
    }

    #[test]
    fn test_tile_shares_cancellation() {
        let token = CancellationToken::new();
        let tile = Tile::new(QuadKey::new(0, 0, 1), Stylesheet::new("a.mapcss"))
            .with_cancellation(token.clone());

        token.cancel();
        assert!(tile.clone().is_cancelled());
    }
}
