use serde::Serialize;
use std::collections::HashMap;

use crate::{BoundingBox, GeoCoordinate, MapDataError, Result};

/// A map feature with geometry, per-vertex heights, tags and resolved styles.
///
/// Elements are immutable once built; `geometry` and `heights` always have
/// one entry per vertex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    id: u64,
    geometry: Vec<GeoCoordinate>,
    heights: Vec<f64>,
    tags: HashMap<String, String>,
    styles: HashMap<String, String>,
}

impl Element {
    /// Build an element, rejecting height arrays that do not match the geometry
    pub fn new(
        id: u64,
        geometry: Vec<GeoCoordinate>,
        heights: Vec<f64>,
        tags: HashMap<String, String>,
        styles: HashMap<String, String>,
    ) -> Result<Self> {
        if geometry.len() != heights.len() {
            return Err(MapDataError::Parse(format!(
                "Element {} has {} points but {} heights",
                id,
                geometry.len(),
                heights.len()
            )));
        }
        Ok(Self {
            id,
            geometry,
            heights,
            tags,
            styles,
        })
    }

    /// Build an element at sea level without styles
    pub fn flat(id: u64, geometry: Vec<GeoCoordinate>, tags: HashMap<String, String>) -> Self {
        let heights = vec![0.0; geometry.len()];
        Self {
            id,
            geometry,
            heights,
            tags,
            styles: HashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn geometry(&self) -> &[GeoCoordinate] {
        &self.geometry
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    pub fn styles(&self) -> &HashMap<String, String> {
        &self.styles
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Copy of this element with new heights and styles, as the engine emits it
    pub fn with_rendering(&self, heights: Vec<f64>, styles: HashMap<String, String>) -> Result<Self> {
        Self::new(
            self.id,
            self.geometry.clone(),
            heights,
            self.tags.clone(),
            styles,
        )
    }

    /// Get the center point of this element's geometry
    pub fn center_point(&self) -> Option<GeoCoordinate> {
        if self.geometry.is_empty() {
            return None;
        }

        let count = self.geometry.len() as f64;
        let lat_sum: f64 = self.geometry.iter().map(|c| c.latitude).sum();
        let lon_sum: f64 = self.geometry.iter().map(|c| c.longitude).sum();

        Some(GeoCoordinate::new(lat_sum / count, lon_sum / count))
    }

    /// Get the bounding box of this element
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if self.geometry.is_empty() {
            return None;
        }

        let mut min_lat = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut min_lon = f64::INFINITY;
        let mut max_lon = f64::NEG_INFINITY;

        for coordinate in &self.geometry {
            min_lat = min_lat.min(coordinate.latitude);
            max_lat = max_lat.max(coordinate.latitude);
            min_lon = min_lon.min(coordinate.longitude);
            max_lon = max_lon.max(coordinate.longitude);
        }

        Some(BoundingBox::new(min_lat, min_lon, max_lat, max_lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_new_rejects_mismatched_heights() {
        let geometry = vec![GeoCoordinate::new(52.0, 13.0), GeoCoordinate::new(52.1, 13.1)];

        let result = Element::new(1, geometry.clone(), vec![0.0], HashMap::new(), HashMap::new());
        assert!(matches!(result, Err(MapDataError::Parse(_))));

        let element =
            Element::new(1, geometry, vec![1.0, 2.0], HashMap::new(), HashMap::new()).unwrap();
        assert_eq!(element.heights(), &[1.0, 2.0]);
    }

    #[test]
    fn test_flat_element() {
        let element = Element::flat(
            7,
            vec![GeoCoordinate::new(52.0, 13.0); 3],
            tags(&[("name", "Spree")]),
        );

        assert_eq!(element.id(), 7);
        assert_eq!(element.heights(), &[0.0, 0.0, 0.0]);
        assert_eq!(element.tag("name"), Some("Spree"));
        assert_eq!(element.tag("missing"), None);
        assert!(element.styles().is_empty());
    }

    #[test]
    fn test_with_rendering() {
        let element = Element::flat(7, vec![GeoCoordinate::new(52.0, 13.0)], HashMap::new());

        let rendered = element
            .with_rendering(vec![34.5], tags(&[("kind", "road")]))
            .unwrap();
        assert_eq!(rendered.heights(), &[34.5]);
        assert_eq!(rendered.styles().get("kind"), Some(&"road".to_string()));

        assert!(element.with_rendering(vec![], HashMap::new()).is_err());
    }

    #[test]
    fn test_element_center_point() {
        let element = Element::flat(
            1,
            vec![
                GeoCoordinate::new(52.0, 13.0),
                GeoCoordinate::new(52.1, 13.1),
                GeoCoordinate::new(52.2, 13.2),
            ],
            HashMap::new(),
        );

        let center = element.center_point().unwrap();
        assert!((center.latitude - 52.1).abs() < 0.001);
        assert!((center.longitude - 13.1).abs() < 0.001);
    }

    #[test]
    fn test_element_bounding_box() {
        let element = Element::flat(
            1,
            vec![
                GeoCoordinate::new(52.0, 13.0),
                GeoCoordinate::new(52.2, 13.2),
                GeoCoordinate::new(52.1, 13.1),
            ],
            HashMap::new(),
        );

        assert_eq!(
            element.bounding_box(),
            Some(BoundingBox::new(52.0, 13.0, 52.2, 13.2))
        );
        assert_eq!(Element::flat(2, vec![], HashMap::new()).bounding_box(), None);
    }
}
