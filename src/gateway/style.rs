use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::Color;

/// Coarse feature classes the in-memory engine styles elements by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FeatureKind {
    /// No recognised tags
    #[default]
    Unclassified,
    Road,
    Building,
    Water,
    GreenSpace,
    Railway,
    Parking,
    Amenity,
    Tourism,
    Industrial,
    Residential,
    Commercial,
    /// Land use without a dedicated class, e.g. `landuse_farmland`
    Custom(String),
}

impl FeatureKind {
    /// Classify a tag set; more specific tags win
    pub fn classify(tags: &HashMap<String, String>) -> Self {
        let tag = |key: &str| tags.get(key).map(String::as_str);

        if let Some(building) = tag("building") {
            match building {
                "residential" => Self::Residential,
                "commercial" | "retail" => Self::Commercial,
                "industrial" => Self::Industrial,
                _ => Self::Building,
            }
        } else if tags.contains_key("highway") {
            Self::Road
        } else if tags.contains_key("waterway") || tag("natural") == Some("water") {
            Self::Water
        } else if matches!(tag("leisure"), Some("park" | "garden"))
            || matches!(tag("landuse"), Some("forest" | "grass"))
            || tag("natural") == Some("wood")
        {
            Self::GreenSpace
        } else if tags.contains_key("railway") {
            Self::Railway
        } else if tag("amenity") == Some("parking") || tag("landuse") == Some("parking") {
            Self::Parking
        } else if tags.contains_key("amenity") {
            Self::Amenity
        } else if tags.contains_key("tourism") {
            Self::Tourism
        } else if let Some(landuse) = tag("landuse") {
            match landuse {
                "residential" => Self::Residential,
                "commercial" | "retail" => Self::Commercial,
                "industrial" => Self::Industrial,
                other => Self::Custom(format!("landuse_{}", other)),
            }
        } else {
            Self::Unclassified
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Road => "road",
            Self::Building => "building",
            Self::Water => "water",
            Self::GreenSpace => "green_space",
            Self::Railway => "railway",
            Self::Parking => "parking",
            Self::Amenity => "amenity",
            Self::Tourism => "tourism",
            Self::Industrial => "industrial",
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Custom(name) => name,
        }
    }

    pub fn default_color(&self) -> Color {
        match self {
            Self::Unclassified => Color::rgb(240, 240, 240),
            Self::Road => Color::rgb(128, 128, 128),
            Self::Building => Color::rgb(139, 69, 19),
            Self::Water => Color::rgb(30, 144, 255),
            Self::GreenSpace => Color::rgb(34, 139, 34),
            Self::Railway => Color::rgb(105, 105, 105),
            Self::Parking => Color::rgb(169, 169, 169),
            Self::Amenity => Color::rgb(255, 165, 0),
            Self::Tourism => Color::rgb(255, 20, 147),
            Self::Industrial => Color::rgb(128, 0, 128),
            Self::Residential => Color::rgb(255, 255, 0),
            Self::Commercial => Color::rgb(255, 0, 0),
            Self::Custom(_) => Color::rgb(200, 200, 200),
        }
    }

    /// Draw order, higher is drawn on top
    pub fn priority(&self) -> u8 {
        match self {
            Self::Unclassified => 0,
            Self::GreenSpace => 1,
            Self::Water => 2,
            Self::Residential => 3,
            Self::Commercial => 4,
            Self::Industrial => 5,
            Self::Parking => 6,
            Self::Road => 7,
            Self::Railway => 8,
            Self::Building => 9,
            Self::Amenity => 10,
            Self::Tourism => 11,
            Self::Custom(_) => 5,
        }
    }
}

/// Style map the in-memory engine attaches to each element it reports
pub fn resolve_styles(tags: &HashMap<String, String>, stylesheet: &Path) -> HashMap<String, String> {
    let kind = FeatureKind::classify(tags);
    let stylesheet_name = stylesheet
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    HashMap::from([
        ("kind".to_string(), kind.name().to_string()),
        ("color".to_string(), kind.default_color().to_hex()),
        ("priority".to_string(), kind.priority().to_string()),
        ("stylesheet".to_string(), stylesheet_name),
    ])
}
