//! Tile pyramid construction.
//!
//! A layer's raster is reprojected to Web Mercator and cut into the TMS
//! grid: every covered `(zoom, x, y)` gets one tile-sized raster aligned to
//! the tile's canonical footprint. The deepest zoom follows the source pixel
//! size according to the [`ZoomPolicy`].

mod builder;
mod config;

pub use builder::{BuildPlan, BuildReport, ProgressCallback, PyramidBuilder, TileFailure};
pub use config::{FailurePolicy, PyramidConfig, ZoomPolicy};

use thiserror::Error;

use crate::coord::{CoordError, TileCoord};
use crate::index::IndexError;
use crate::raster::RasterError;
use crate::workers::WorkerPoolError;

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Raster has no pixels to tile")]
    EmptyRaster,

    #[error("Tile {coord} failed: {reason}")]
    TileFailed { coord: TileCoord, reason: String },

    #[error("Build was cancelled before every tile was staged")]
    Cancelled,

    #[error("Invalid pyramid settings: {0}")]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    WorkerPool(#[from] WorkerPoolError),
}
