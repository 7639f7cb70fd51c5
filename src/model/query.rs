use serde::{Deserialize, Serialize};

use crate::{BoundingBox, LodRange};

/// Text and spatial search request.
///
/// Terms are space-separated keywords forwarded verbatim to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapQuery {
    pub not_terms: String,
    pub and_terms: String,
    pub or_terms: String,
    pub bounding_box: BoundingBox,
    pub lod_range: LodRange,
}

impl MapQuery {
    /// A query matching everything inside the box
    pub fn new(bounding_box: BoundingBox, lod_range: LodRange) -> Self {
        Self {
            not_terms: String::new(),
            and_terms: String::new(),
            or_terms: String::new(),
            bounding_box,
            lod_range,
        }
    }

    pub fn with_not_terms(mut self, terms: impl Into<String>) -> Self {
        self.not_terms = terms.into();
        self
    }

    pub fn with_and_terms(mut self, terms: impl Into<String>) -> Self {
        self.and_terms = terms.into();
        self
    }

    pub fn with_or_terms(mut self, terms: impl Into<String>) -> Self {
        self.or_terms = terms.into();
        self
    }
}

/// Split a term string into lowercase keywords
pub fn keywords(terms: &str) -> Vec<String> {
    terms.split_whitespace().map(str::to_lowercase).collect()
}
