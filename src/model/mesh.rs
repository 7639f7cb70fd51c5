use serde::{Deserialize, Serialize};

use super::{Element, Tile};

/// RGBA color unpacked from the engine's `0xAARRGGBB` representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn from_packed(packed: i32) -> Self {
        let [a, r, g, b] = (packed as u32).to_be_bytes();
        Self { r, g, b, a }
    }

    pub fn to_packed(self) -> i32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b]) as i32
    }

    /// `#rrggbb` form used in style maps
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Renderable geometry built by the engine for a tile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    /// World-space positions, `[x, y, z]` with y up
    pub vertices: Vec<[f64; 3]>,
    /// Triangle list indexing into `vertices`
    pub triangles: Vec<u32>,
    pub colors: Vec<Color>,
    pub uvs: Vec<[f64; 2]>,
    pub uvs2: Vec<[f64; 2]>,
    pub uvs3: Vec<[f64; 2]>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }
}

/// Payload pushed to map data listeners
#[derive(Debug, Clone)]
pub enum MapDataKind {
    Element(Element),
    Mesh(Mesh),
}

/// One decoded engine payload together with the tile it was requested for
#[derive(Debug, Clone)]
pub struct MapData {
    pub tile: Tile,
    pub kind: MapDataKind,
}

impl MapData {
    pub fn element(&self) -> Option<&Element> {
        match &self.kind {
            MapDataKind::Element(element) => Some(element),
            MapDataKind::Mesh(_) => None,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            MapDataKind::Mesh(mesh) => Some(mesh),
            MapDataKind::Element(_) => None,
        }
    }
}
