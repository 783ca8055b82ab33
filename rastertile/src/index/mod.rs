//! Tile index
//!
//! Owns the tiles of every built layer, addressed by layer and TMS
//! coordinate, together with per-layer metadata.

mod error;
mod index;
mod tile;

pub use error::IndexError;
pub use index::{MissReason, TileIndex, TileListing};
pub use tile::{LayerInfo, LayerKind, RasterLayer, Tile};
