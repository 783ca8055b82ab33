//! The georeferenced raster: bands plus affine transform and SRID.

use std::path::{Path, PathBuf};

use super::srs::Reprojection;
use super::warp::{warp_raster, Resampling, WarpTarget};
use super::{Band, BufferPool, Extent, GeoTransform, RasterError};

/// Where a raster's pixels live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackingStore {
    /// Decoded from a file that can be reopened later.
    File(PathBuf),
    /// Exists only in memory.
    Memory,
}

impl BackingStore {
    /// Whether the raster can be reopened from durable storage.
    pub fn is_durable(&self) -> bool {
        matches!(self, BackingStore::File(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            BackingStore::File(path) => Some(path),
            BackingStore::Memory => None,
        }
    }
}

/// A georeferenced, multi-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRaster {
    width: usize,
    height: usize,
    transform: GeoTransform,
    srid: u32,
    bands: Vec<Band>,
    backing: BackingStore,
}

impl GeoRaster {
    /// Assemble a raster, checking every band against the raster dimensions.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        srid: u32,
        bands: Vec<Band>,
        backing: BackingStore,
    ) -> Result<Self, RasterError> {
        for band in &bands {
            if band.width() != width || band.height() != height {
                return Err(RasterError::InvalidBuffer {
                    expected: width * height,
                    actual: band.len(),
                });
            }
        }
        Ok(Self {
            width,
            height,
            transform,
            srid,
            bands,
            backing,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn srid(&self) -> u32 {
        self.srid
    }

    pub fn backing(&self) -> &BackingStore {
        &self.backing
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn into_bands(self) -> Vec<Band> {
        self.bands
    }

    /// Band `index`, or `BandIndexOutOfRange`.
    pub fn band(&self, index: usize) -> Result<&Band, RasterError> {
        self.bands
            .get(index)
            .ok_or(RasterError::BandIndexOutOfRange {
                index,
                band_count: self.bands.len(),
            })
    }

    /// Replace the backing store, e.g. after the raster was written to disk.
    pub fn with_backing(mut self, backing: BackingStore) -> Self {
        self.backing = backing;
        self
    }

    /// Bounding box of the raster in its own SRS.
    pub fn extent(&self) -> Extent {
        let w = self.width as f64;
        let h = self.height as f64;
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .map(|(col, row)| self.transform.pixel_to_world(col, row));
        // Four points are never empty.
        Extent::from_points(corners).unwrap_or(Extent::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Bounding box of the raster reprojected to `srid`.
    ///
    /// The raster boundary is densified so curved edges after reprojection
    /// stay inside the box.
    pub fn extent_in(&self, srid: u32) -> Result<Extent, RasterError> {
        let reprojection = Reprojection::between(self.srid, srid)?;
        if reprojection == Reprojection::Identity {
            return Ok(self.extent());
        }
        const STEPS: usize = 16;
        let w = self.width as f64;
        let h = self.height as f64;
        let mut points = Vec::with_capacity(STEPS * 4 + 4);
        for i in 0..=STEPS {
            let t = i as f64 / STEPS as f64;
            for (col, row) in [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)] {
                let (x, y) = self.transform.pixel_to_world(col, row);
                points.push(reprojection.apply(x, y));
            }
        }
        Ok(Extent::from_points(points).unwrap_or(Extent::new(0.0, 0.0, 0.0, 0.0)))
    }

    /// Resample this raster onto a new grid, possibly in another SRS.
    pub fn warp(&self, target: &WarpTarget, resampling: Resampling) -> Result<GeoRaster, RasterError> {
        warp_raster(self, target, resampling, &BufferPool::new(0))
    }

    /// Like [`GeoRaster::warp`], drawing output buffers from `pool`.
    pub fn warp_with_pool(
        &self,
        target: &WarpTarget,
        resampling: Resampling,
        pool: &BufferPool,
    ) -> Result<GeoRaster, RasterError> {
        warp_raster(self, target, resampling, pool)
    }
}
