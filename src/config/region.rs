use geo::{Destination, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Convert to a `geo` point, which is ordered (lon, lat)
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Great-circle distance to another coordinate in meters
    pub fn distance_m(&self, other: &GeoCoordinate) -> f64 {
        Haversine.distance(self.to_point(), other.to_point())
    }
}

/// Represents a geographic bounding box for map data requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern latitude boundary
    pub south: f64,
    /// Western longitude boundary
    pub west: f64,
    /// Northern latitude boundary
    pub north: f64,
    /// Eastern longitude boundary
    pub east: f64,
}

impl BoundingBox {
    /// Create a new bounding box from coordinates
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Create a bounding box from its south-west and north-east corners
    pub fn from_points(min_point: GeoCoordinate, max_point: GeoCoordinate) -> Self {
        Self::new(
            min_point.latitude,
            min_point.longitude,
            max_point.latitude,
            max_point.longitude,
        )
    }

    /// Create a bounding box reaching `radius_km` from `center` in each cardinal direction
    pub fn around(center: GeoCoordinate, radius_km: f64) -> Self {
        let origin = center.to_point();
        let distance_meters = radius_km * 1000.0;

        let north_point = Haversine.destination(origin, 0.0, distance_meters);
        let south_point = Haversine.destination(origin, 180.0, distance_meters);
        let east_point = Haversine.destination(origin, 90.0, distance_meters);
        let west_point = Haversine.destination(origin, 270.0, distance_meters);

        BoundingBox::new(
            south_point.y(),
            west_point.x(),
            north_point.y(),
            east_point.x(),
        )
    }

    /// South-west corner
    pub fn min_point(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.south, self.west)
    }

    /// North-east corner
    pub fn max_point(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.north, self.east)
    }

    /// Get the center point of the bounding box
    pub fn center(&self) -> GeoCoordinate {
        GeoCoordinate::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Get the width of the bounding box in degrees longitude
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Get the height of the bounding box in degrees latitude
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Get the approximate area in square kilometers using geographic calculations
    pub fn area_km2(&self) -> f64 {
        let center = self.center();

        let width_km = {
            let west_point = Point::new(self.west, center.latitude);
            let east_point = Point::new(self.east, center.latitude);
            Haversine.distance(west_point, east_point) / 1000.0
        };

        let height_km = {
            let south_point = Point::new(center.longitude, self.south);
            let north_point = Point::new(center.longitude, self.north);
            Haversine.distance(south_point, north_point) / 1000.0
        };

        width_km * height_km
    }

    /// Check if this bounding box contains a point
    pub fn contains(&self, coordinate: &GeoCoordinate) -> bool {
        coordinate.latitude >= self.south
            && coordinate.latitude <= self.north
            && coordinate.longitude >= self.west
            && coordinate.longitude <= self.east
    }

    /// Check whether two boxes overlap; touching edges count as overlap
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }

    /// Expand the bounding box by a given distance in kilometers
    pub fn expand_by_km(&self, distance_km: f64) -> BoundingBox {
        let center = self.center();
        let distance_meters = distance_km * 1000.0;

        let new_north = Haversine.destination(
            Point::new(center.longitude, self.north),
            0.0,
            distance_meters,
        );
        let new_south = Haversine.destination(
            Point::new(center.longitude, self.south),
            180.0,
            distance_meters,
        );
        let new_east = Haversine.destination(
            Point::new(self.east, center.latitude),
            90.0,
            distance_meters,
        );
        let new_west = Haversine.destination(
            Point::new(self.west, center.latitude),
            270.0,
            distance_meters,
        );

        BoundingBox::new(new_south.y(), new_west.x(), new_north.y(), new_east.x())
    }
}

/// Inclusive span of levels of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LodRange {
    pub minimum: u8,
    pub maximum: u8,
}

impl LodRange {
    /// Create a range; the bounds are swapped if given out of order
    pub fn new(minimum: u8, maximum: u8) -> Self {
        Self {
            minimum: minimum.min(maximum),
            maximum: minimum.max(maximum),
        }
    }

    /// A range covering exactly one level of detail
    pub fn single(level_of_detail: u8) -> Self {
        Self::new(level_of_detail, level_of_detail)
    }

    pub fn contains(&self, level_of_detail: u8) -> bool {
        (self.minimum..=self.maximum).contains(&level_of_detail)
    }

    /// Reject ranges reaching past [`MAX_LEVEL_OF_DETAIL`](crate::MAX_LEVEL_OF_DETAIL)
    pub fn validate(&self) -> crate::Result<()> {
        if self.maximum > crate::MAX_LEVEL_OF_DETAIL {
            return Err(crate::MapDataError::Geographic(format!(
                "Level of detail range {}..={} reaches past the maximum of {}",
                self.minimum,
                self.maximum,
                crate::MAX_LEVEL_OF_DETAIL
            )));
        }
        Ok(())
    }

    /// Iterate every level of detail in the range, lowest first
    pub fn levels(&self) -> impl Iterator<Item = u8> {
        self.minimum..=self.maximum
    }
}
