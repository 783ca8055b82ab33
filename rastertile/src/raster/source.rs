//! Where rasters come from.
//!
//! A [`RasterSource`] decodes some input into a [`GeoRaster`]. File sources
//! produce file-backed rasters that can back a persisted layer; the in-memory
//! source is for derived or test data only.

use tracing::debug;

use super::{BackingStore, Band, GeoRaster, GeoTransform, RasterError};

/// Something that can be decoded into a georeferenced raster.
pub trait RasterSource: Send + Sync {
    /// Decode the source.
    fn open(&self) -> Result<GeoRaster, RasterError>;

    /// Human-readable description used in logs and error messages.
    fn describe(&self) -> String;
}

/// Open a raster source, logging what was decoded.
pub fn open<S: RasterSource + ?Sized>(source: &S) -> Result<GeoRaster, RasterError> {
    let raster = source.open()?;
    debug!(
        source = %source.describe(),
        width = raster.width(),
        height = raster.height(),
        bands = raster.band_count(),
        srid = raster.srid(),
        "Opened raster"
    );
    Ok(raster)
}

/// Pre-decoded pixel buffers.
#[derive(Debug, Clone)]
pub struct MemorySource {
    width: usize,
    height: usize,
    transform: GeoTransform,
    srid: u32,
    bands: Vec<Band>,
}

impl MemorySource {
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        srid: u32,
        bands: Vec<Band>,
    ) -> Self {
        Self {
            width,
            height,
            transform,
            srid,
            bands,
        }
    }
}

impl RasterSource for MemorySource {
    fn open(&self) -> Result<GeoRaster, RasterError> {
        GeoRaster::new(
            self.width,
            self.height,
            self.transform,
            self.srid,
            self.bands.clone(),
            BackingStore::Memory,
        )
    }

    fn describe(&self) -> String {
        format!(
            "memory {}x{} ({} bands)",
            self.width,
            self.height,
            self.bands.len()
        )
    }
}
