//! Address lookup on top of the broker's element stream.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    BoundingBox, CancellationToken, Element, GeoCoordinate, ListenerRegistry, LodRange,
    MapDataBroker, MapQuery, Result, Subscription,
};

/// Tags that make up a display name, in output order
pub const ADDRESS_TAG_KEYS: [&str; 11] = [
    "addr:country",
    "addr:city",
    "addr:suburb",
    "addr:state",
    "addr:province",
    "addr:district",
    "addr:postcode",
    "addr:place",
    "addr:street",
    "addr:housenumber",
    "name",
];

/// Join the present address tags with `", "`
pub fn display_name(tags: &HashMap<String, String>) -> String {
    ADDRESS_TAG_KEYS
        .iter()
        .filter_map(|key| tags.get(*key))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A geocoding request
#[derive(Debug, Clone, PartialEq)]
pub enum GeocoderRequest {
    /// Everything within `radius_km` of `center`
    Radius { center: GeoCoordinate, radius_km: f64 },
    /// Elements whose tags mention every word of `name`
    Text { name: String, bounding_box: BoundingBox },
}

impl GeocoderRequest {
    pub fn to_query(&self, lod_range: LodRange) -> MapQuery {
        match self {
            Self::Radius { center, radius_km } => {
                MapQuery::new(BoundingBox::around(*center, *radius_km), lod_range)
            }
            Self::Text { name, bounding_box } => {
                MapQuery::new(bounding_box.clone(), lod_range).with_and_terms(name.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocoderResult {
    pub element: Element,
    pub display_name: String,
}

impl From<&Element> for GeocoderResult {
    fn from(element: &Element) -> Self {
        Self {
            display_name: display_name(element.tags()),
            element: element.clone(),
        }
    }
}

/// Turns every element the broker finds into a [`GeocoderResult`].
///
/// Elements found by any search on the broker are republished, not only
/// those of [`Geocoder::search`]. Dropping the geocoder ends its broker
/// subscription.
pub struct Geocoder {
    broker: Arc<MapDataBroker>,
    lod_range: LodRange,
    results: ListenerRegistry<GeocoderResult>,
    _elements: Subscription,
}

impl Geocoder {
    pub fn new(broker: Arc<MapDataBroker>) -> Self {
        let results = ListenerRegistry::new();
        let publisher = results.clone();
        let elements = broker.subscribe_elements(move |element: &Element| {
            publisher.emit(&GeocoderResult::from(element));
        });

        Self {
            broker,
            lod_range: LodRange::new(1, 16),
            results,
            _elements: elements,
        }
    }

    /// Search a different span of levels of detail
    pub fn with_lod_range(mut self, lod_range: LodRange) -> Self {
        self.lod_range = lod_range;
        self
    }

    pub fn lod_range(&self) -> LodRange {
        self.lod_range
    }

    /// Run a request; returns how many elements were found
    pub fn search(&self, request: &GeocoderRequest, cancellation: &CancellationToken) -> Result<usize> {
        let query = request.to_query(self.lod_range);
        tracing::debug!("Geocoding {:?}", request);
        self.broker.submit_query(&query, cancellation)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&GeocoderResult) + Send + Sync + 'static,
    ) -> Subscription {
        self.results.subscribe(listener)
    }
}

impl std::fmt::Debug for Geocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geocoder")
            .field("lod_range", &self.lod_range)
            .field("listeners", &self.results.len())
            .finish()
    }
}
