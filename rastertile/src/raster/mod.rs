//! GeoRaster adapter
//!
//! Georeferenced rasters: typed bands with nodata, an affine transform,
//! an EPSG code and a backing store. Sources decode files (GeoTIFF) or wrap
//! in-memory buffers; [`GeoRaster::warp`] resamples onto another grid.

mod band;
mod error;
mod geotiff;
mod georaster;
mod pool;
mod source;
pub mod srs;
mod types;
mod warp;

pub use band::Band;
pub use error::RasterError;
pub use geotiff::GeoTiffSource;
pub use georaster::{BackingStore, GeoRaster};
pub use pool::{BufferPool, PoolStats, DEFAULT_MAX_IDLE_PER_SIZE};
pub use source::{open, MemorySource, RasterSource};
pub use srs::{reproject, Reprojection, WEB_MERCATOR_SRID, WGS84_SRID};
pub use types::{DataType, Extent, GeoTransform, InverseTransform, Window};
pub use warp::{Resampling, WarpTarget};
