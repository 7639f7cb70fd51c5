//! A Rust library for brokering OpenStreetMap tile data between a map engine and its consumers.
//!
//! The [`MapDataBroker`] registers stylesheets and storages with an
//! [`EngineGateway`], loads tiles and runs text searches, and pushes every
//! decoded mesh and element to subscribers. Missing tile data can be fetched
//! from a [`TileDataSource`] first. The core library is WASM-compatible and has
//! optional Bevy integration.

#[cfg(feature = "bevy")]
pub mod bevy_plugin;
pub mod broker;
pub mod config;
pub mod error;
pub mod gateway;
pub mod geocoder;
pub mod http;
pub mod model;
pub mod source;
#[cfg(test)]
mod test_util;

pub use broker::*;
pub use config::*;
pub use error::*;
pub use gateway::{EngineGateway, InMemoryEngine};
pub use geocoder::*;
pub use model::*;
pub use source::*;
