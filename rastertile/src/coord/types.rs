//! Coordinate type definitions

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zoom levels supported by the pyramid.
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 22;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Number of tiles along one side of the grid at `zoom`.
#[inline]
pub fn tiles_per_side(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Tile address in the TMS scheme.
///
/// `x` grows eastward from the western edge of the grid and `y` grows
/// northward from the southern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level (0-22)
    pub zoom: u8,
    /// Column, 0 at west
    pub x: u32,
    /// Row, 0 at south
    pub y: u32,
}

impl TileCoord {
    /// Create a TMS tile coordinate, checking it lies on the grid.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let n = tiles_per_side(zoom);
        if x >= n || y >= n {
            return Err(CoordError::OutOfGrid { zoom, x, y });
        }
        Ok(Self { zoom, x, y })
    }

    /// Convert from XYZ (slippy map) addressing, where y grows southward.
    pub fn from_xyz(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let n = tiles_per_side(zoom);
        if y >= n {
            return Err(CoordError::OutOfGrid { zoom, x, y });
        }
        Self::new(zoom, x, n - 1 - y)
    }

    /// The same tile in XYZ addressing as `(zoom, x, y)`.
    #[inline]
    pub fn to_xyz(&self) -> (u8, u32, u32) {
        (self.zoom, self.x, tiles_per_side(self.zoom) - 1 - self.y)
    }

    /// The tile one zoom level up that contains this one.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.zoom == 0 {
            return None;
        }
        Some(TileCoord {
            zoom: self.zoom - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Identifier of a raster layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Full address of a tile: which layer, which grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub layer: LayerId,
    pub coord: TileCoord,
}

impl TileKey {
    pub fn new(layer: LayerId, coord: TileCoord) -> Self {
        Self { layer, coord }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.layer, self.coord)
    }
}

/// Inclusive range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self, CoordError> {
        if max > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(max));
        }
        if min > max {
            return Err(CoordError::InvalidZoomRange { min, max });
        }
        Ok(Self { min, max })
    }

    #[inline]
    pub fn contains(&self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> {
        self.min..=self.max
    }
}

impl fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        (self.max_x - self.min_x + 1) as usize * (self.max_y - self.min_y + 1) as usize
    }

    /// A range always holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&coord.x)
            && (self.min_y..=self.max_y).contains(&coord.y)
    }

    /// Tiles in the range ordered by `(x, y)`.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> {
        let range = *self;
        (range.min_x..=range.max_x).flat_map(move |x| {
            (range.min_y..=range.max_y).map(move |y| TileCoord {
                zoom: range.zoom,
                x,
                y,
            })
        })
    }
}

/// Errors that can occur during tile coordinate handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Zoom level is above the supported maximum
    #[error("Invalid zoom level: {0} (must be between {} and {})", MIN_ZOOM, MAX_ZOOM)]
    InvalidZoom(u8),

    /// Tile column or row does not exist at this zoom level
    #[error("Tile {x}/{y} is outside the grid at zoom {zoom}")]
    OutOfGrid { zoom: u8, x: u32, y: u32 },

    /// Minimum zoom above maximum zoom
    #[error("Invalid zoom range: {min} > {max}")]
    InvalidZoomRange { min: u8, max: u8 },

    /// Tile size is zero or not a power of two
    #[error("Invalid tile size: {0} (must be a non-zero power of two)")]
    InvalidTileSize(u32),
}
