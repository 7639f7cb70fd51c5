mod cancel;
mod element;
mod mesh;
mod quad_key;
mod query;
mod tile;

pub use cancel::*;
pub use element::*;
pub use mesh::*;
pub use quad_key::*;
pub use query::*;
pub use tile::*;
