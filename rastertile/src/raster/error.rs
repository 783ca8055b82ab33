//! Error types for raster access and warping.

use std::path::PathBuf;

use thiserror::Error;

use super::DataType;

/// Errors raised by the GeoRaster adapter.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The codec could not parse the input.
    #[error("Raster source '{}' is unreadable: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// An in-memory raster was used where a durable, re-openable file is required.
    #[error("Raster must be file based to back a persisted layer")]
    InvalidBackingStore,

    /// Band index is not below the band count.
    #[error("Band index {index} out of range (raster has {band_count} bands)")]
    BandIndexOutOfRange { index: usize, band_count: usize },

    /// Requested window extends past the raster edges.
    #[error(
        "Window {width}x{height}+{col}+{row} exceeds raster bounds {raster_width}x{raster_height}"
    )]
    WindowOutOfBounds {
        col: usize,
        row: usize,
        width: usize,
        height: usize,
        raster_width: usize,
        raster_height: usize,
    },

    /// A pixel buffer does not match the declared dimensions.
    #[error("Band buffer holds {actual} pixels, expected {expected}")]
    InvalidBuffer { expected: usize, actual: usize },

    /// A pixel value cannot be stored in the band's data type.
    #[error("Pixel {index} value {value} is not representable as {dtype}")]
    ValueNotRepresentable {
        index: usize,
        value: f64,
        dtype: DataType,
    },

    /// No reprojection exists between the two spatial references.
    #[error("Unsupported transform from EPSG:{from} to EPSG:{to}")]
    UnsupportedTransform { from: u32, to: u32 },

    /// The affine transform cannot be inverted.
    #[error("Geotransform is not invertible (determinant is zero)")]
    SingularTransform,
}
