//! Tile index errors.

use thiserror::Error;

use crate::coord::{LayerId, TileKey};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// No tile is stored under the key.
    #[error("Tile {0} not found")]
    NotFound(TileKey),

    /// The layer was never registered with the index.
    #[error("Unknown layer {0}")]
    UnknownLayer(LayerId),

    /// The point lies outside the tile grid.
    #[error("Point ({x}, {y}) is outside the tile grid at zoom {zoom}")]
    OutsideGrid { zoom: u8, x: f64, y: f64 },

    /// A tile raster is not a square of the layer's tile size.
    #[error("Tile {key} is {width}x{height}, expected {tile_size}x{tile_size}")]
    InvalidTileShape {
        key: TileKey,
        width: usize,
        height: usize,
        tile_size: u32,
    },
}
