use std::collections::HashMap;

use super::{RawElement, RawMesh};
use crate::{Color, Element, GeoCoordinate, MapDataError, Mesh, Projection, Result};

/// Element reduced to the primitive arrays the engine accepts
#[derive(Debug, Clone, PartialEq)]
pub struct FlatElement {
    /// (latitude, longitude) pairs
    pub coordinates: Vec<f64>,
    /// (key, value) pairs
    pub tags: Vec<String>,
}

/// Flatten an element's geometry and tags for the engine boundary
pub fn flatten_element(element: &Element) -> FlatElement {
    let coordinates = element
        .geometry()
        .iter()
        .flat_map(|c| [c.latitude, c.longitude])
        .collect();

    let mut pairs: Vec<_> = element.tags().iter().collect();
    pairs.sort();
    let tags = pairs
        .into_iter()
        .flat_map(|(key, value)| [key.clone(), value.clone()])
        .collect();

    FlatElement { coordinates, tags }
}

/// Rebuild a string map from alternating key, value entries
pub fn decode_pairs(values: &[String], what: &str) -> Result<HashMap<String, String>> {
    if values.len() % 2 != 0 {
        return Err(MapDataError::Parse(format!(
            "Expected key/value pairs for {}, got {} strings",
            what,
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

/// Rebuild coordinates from (latitude, longitude) pairs
pub fn decode_coordinates(values: &[f64]) -> Result<Vec<GeoCoordinate>> {
    if values.len() % 2 != 0 {
        return Err(MapDataError::Parse(format!(
            "Expected latitude/longitude pairs, got {} values",
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| GeoCoordinate::new(pair[0], pair[1]))
        .collect())
}

/// Encode an element in the shape the engine reports it
pub fn encode_element(element: &Element) -> RawElement {
    let flatten = |map: &HashMap<String, String>| {
        let mut pairs: Vec<_> = map.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .flat_map(|(key, value)| [key.clone(), value.clone()])
            .collect::<Vec<_>>()
    };

    let vertices = element
        .geometry()
        .iter()
        .zip(element.heights())
        .flat_map(|(c, height)| [c.latitude, c.longitude, *height])
        .collect();

    RawElement {
        id: element.id(),
        tags: flatten(element.tags()),
        vertices,
        styles: flatten(element.styles()),
    }
}

/// Turn an element payload into an [`Element`]
pub fn decode_element(raw: RawElement) -> Result<Element> {
    if raw.vertices.len() % 3 != 0 {
        return Err(MapDataError::Parse(format!(
            "Element {} has {} vertex values, expected latitude/longitude/height triples",
            raw.id,
            raw.vertices.len()
        )));
    }

    let (geometry, heights): (Vec<GeoCoordinate>, Vec<f64>) = raw
        .vertices
        .chunks_exact(3)
        .map(|v| (GeoCoordinate::new(v[0], v[1]), v[2]))
        .unzip();

    let tags = decode_pairs(&raw.tags, "element tags")?;
    let styles = decode_pairs(&raw.styles, "element styles")?;

    Element::new(raw.id, geometry, heights, tags, styles)
}

fn decode_uvs(values: &[f64], channel: &str) -> Result<Vec<[f64; 2]>> {
    if values.len() % 2 != 0 {
        return Err(MapDataError::Parse(format!(
            "Mesh {} has an odd number of values",
            channel
        )));
    }
    Ok(values.chunks_exact(2).map(|uv| [uv[0], uv[1]]).collect())
}

/// Turn a mesh payload into a [`Mesh`], projecting vertices into world space
pub fn decode_mesh(raw: RawMesh, projection: &Projection) -> Result<Mesh> {
    if raw.vertices.len() % 3 != 0 {
        return Err(MapDataError::Parse(format!(
            "Mesh '{}' has {} vertex values, expected x/y/height triples",
            raw.name,
            raw.vertices.len()
        )));
    }
    if raw.triangles.len() % 3 != 0 {
        return Err(MapDataError::Parse(format!(
            "Mesh '{}' has {} triangle indices, expected a multiple of three",
            raw.name,
            raw.triangles.len()
        )));
    }

    let vertices: Vec<[f64; 3]> = raw
        .vertices
        .chunks_exact(3)
        .map(|v| projection.project(GeoCoordinate::new(v[1], v[0]), v[2]))
        .collect();

    let triangles = raw
        .triangles
        .iter()
        .map(|&index| match u32::try_from(index) {
            Ok(i) if (i as usize) < vertices.len() => Ok(i),
            _ => Err(MapDataError::Parse(format!(
                "Mesh '{}' references vertex {} of {}",
                raw.name,
                index,
                vertices.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Mesh {
        colors: raw.colors.iter().map(|&c| Color::from_packed(c)).collect(),
        uvs: decode_uvs(&raw.uvs, "uvs")?,
        uvs2: decode_uvs(&raw.uvs2, "uvs2")?,
        uvs3: decode_uvs(&raw.uvs3, "uvs3")?,
        name: raw.name,
        vertices,
        triangles,
    })
}
