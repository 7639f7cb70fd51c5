use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::{Element, GeoCoordinate, MapDataError, Result};

/// Type of OSM element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsmElementType {
    Node,
    Way,
    Relation,
}

/// Parser for Overpass JSON data files
pub struct OsmParser;

impl OsmParser {
    /// Read and parse a data file
    pub fn parse_file(&self, path: &Path) -> Result<Vec<Element>> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            MapDataError::Parse(format!("Failed to read data file '{}': {}", path.display(), e))
        })?;
        self.parse_json(&data)
    }

    /// Parse an Overpass JSON document into flat elements
    pub fn parse_json(&self, json_data: &str) -> Result<Vec<Element>> {
        let parsed: Value = serde_json::from_str(json_data)
            .map_err(|e| MapDataError::Parse(format!("Invalid JSON: {}", e)))?;

        let elements = parsed
            .get("elements")
            .and_then(|e| e.as_array())
            .ok_or_else(|| MapDataError::Parse("No 'elements' array found in JSON".to_string()))?;

        let mut parsed_elements = Vec::new();
        for element in elements {
            if let Some(element) = self.parse_json_element(element)? {
                parsed_elements.push(element);
            }
        }

        Ok(parsed_elements)
    }

    fn parse_json_element(&self, element: &Value) -> Result<Option<Element>> {
        let id = element
            .get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| MapDataError::Parse("Element missing 'id'".to_string()))?;

        let element_type_str = element
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MapDataError::Parse("Element missing 'type'".to_string()))?;

        let element_type = match element_type_str {
            "node" => OsmElementType::Node,
            "way" => OsmElementType::Way,
            "relation" => OsmElementType::Relation,
            _ => return Ok(None),
        };

        let mut tags = HashMap::new();
        if let Some(tags_obj) = element.get("tags").and_then(|v| v.as_object()) {
            for (key, value) in tags_obj {
                if let Some(value_str) = value.as_str() {
                    tags.insert(key.clone(), value_str.to_string());
                }
            }
        }

        let geometry = match element_type {
            OsmElementType::Node => vec![Self::coordinate(element, "Node")?],
            OsmElementType::Way | OsmElementType::Relation => {
                if let Some(geometry_array) = element.get("geometry").and_then(|v| v.as_array()) {
                    geometry_array
                        .iter()
                        .map(|point| Self::coordinate(point, "Geometry point"))
                        .collect::<Result<Vec<_>>>()?
                } else if let Ok(center) = Self::coordinate(element, "Element") {
                    vec![center]
                } else {
                    Vec::new()
                }
            }
        };

        // Untagged nodes are way vertices; geometry-less elements cannot be placed
        if geometry.is_empty() || tags.is_empty() {
            return Ok(None);
        }

        Ok(Some(Element::flat(id, geometry, tags)))
    }

    fn coordinate(value: &Value, what: &str) -> Result<GeoCoordinate> {
        let lat = value
            .get("lat")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| MapDataError::Parse(format!("{} missing 'lat'", what)))?;
        let lon = value
            .get("lon")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| MapDataError::Parse(format!("{} missing 'lon'", what)))?;
        Ok(GeoCoordinate::new(lat, lon))
    }
}
