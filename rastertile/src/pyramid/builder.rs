//! Cutting a layer's raster into a tile pyramid.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BuildError, FailurePolicy, PyramidConfig, ZoomPolicy};
use crate::coord::{
    native_zoom, tile_range_for_extent, tile_transform, zoom_down, LayerId, TileCoord, TileKey,
    TileRange, ZoomRange,
};
use crate::index::{LayerInfo, RasterLayer, Tile, TileIndex};
use crate::raster::{
    BufferPool, Extent, GeoRaster, Resampling, WarpTarget, DEFAULT_MAX_IDLE_PER_SIZE,
    WEB_MERCATOR_SRID,
};
use crate::workers::WorkerPool;

/// Receives `(done, total)` after every tile.
pub type ProgressCallback = dyn Fn(usize, usize) + Send + Sync;

/// Zoom levels and tile ranges a build will produce.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    /// Source extent in the pyramid SRS.
    pub extent: Extent,
    /// Effective source pixel size in pyramid units.
    pub pixel_size: f64,
    pub zoom_range: ZoomRange,
    /// One range per zoom level that intersects the grid.
    pub ranges: Vec<TileRange>,
}

impl BuildPlan {
    pub fn tile_count(&self) -> usize {
        self.ranges.iter().map(TileRange::len).sum()
    }
}

/// A tile that could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFailure {
    pub coord: TileCoord,
    pub reason: String,
}

/// Outcome of a build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub layer: LayerId,
    /// Zoom levels fully processed, `None` when nothing was.
    pub zoom_range: Option<ZoomRange>,
    pub tiles_written: usize,
    /// Writes that overwrote an existing tile.
    pub tiles_replaced: usize,
    pub failures: Vec<TileFailure>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }
}

enum TileOutcome {
    Built(Tile),
    Failed(TileFailure),
    Skipped,
}

/// Builds tile pyramids on a dedicated worker pool.
///
/// Tiles of one zoom level are warped in parallel; zoom levels run in order.
/// Rebuilding a layer overwrites its tiles by key with identical content.
#[derive(Debug)]
pub struct PyramidBuilder {
    config: PyramidConfig,
    pool: WorkerPool,
    buffers: Arc<BufferPool>,
}

impl PyramidBuilder {
    pub fn new(config: PyramidConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let pool = WorkerPool::new(config.workers, "pyramid")?;
        Ok(Self {
            config,
            pool,
            buffers: Arc::new(BufferPool::new(DEFAULT_MAX_IDLE_PER_SIZE)),
        })
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    /// Work out the zoom range and tile ranges for `raster`.
    pub fn plan(&self, raster: &GeoRaster) -> Result<BuildPlan, BuildError> {
        let extent = raster.extent_in(WEB_MERCATOR_SRID)?;
        if raster.width() == 0 || extent.width() <= 0.0 || !extent.width().is_finite() {
            return Err(BuildError::EmptyRaster);
        }
        let pixel_size = extent.width() / raster.width() as f64;
        let tile_size = self.config.tile_size;
        let max_zoom = match self.config.zoom_policy {
            ZoomPolicy::Down => zoom_down(pixel_size, tile_size),
            ZoomPolicy::Up => native_zoom(pixel_size, tile_size),
        };
        let zoom_range = ZoomRange::new(self.config.min_zoom.min(max_zoom), max_zoom)?;
        let ranges = zoom_range
            .iter()
            .filter_map(|zoom| tile_range_for_extent(&extent, zoom))
            .collect();
        Ok(BuildPlan {
            extent,
            pixel_size,
            zoom_range,
            ranges,
        })
    }

    /// Build every tile of `layer` into `index`.
    ///
    /// The layer is registered (or re-registered) before any tile is written.
    /// `cancel` is checked before each tile.
    pub fn build(
        &self,
        layer: &RasterLayer,
        index: &TileIndex,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let raster = layer.raster();
        let plan = self.plan(raster)?;
        let band = raster.band(0)?;
        let resampling = self.config.resampling_for(layer.kind());

        let previous = index.zoom_range(layer.id()).ok().flatten();
        index.register_layer(LayerInfo {
            id: layer.id(),
            name: layer.name().to_string(),
            kind: layer.kind(),
            tile_size: self.config.tile_size,
            extent: plan.extent,
            dtype: band.dtype(),
            band_count: raster.band_count(),
            nodata: band.nodata(),
            zoom_range: previous,
        });

        info!(
            layer = %layer.id(),
            name = layer.name(),
            min_zoom = plan.zoom_range.min,
            max_zoom = plan.zoom_range.max,
            tiles = plan.tile_count(),
            resampling = %resampling,
            "Building tile pyramid"
        );

        let total = plan.tile_count();
        let done = AtomicUsize::new(0);
        let mut report = BuildReport {
            layer: layer.id(),
            zoom_range: None,
            tiles_written: 0,
            tiles_replaced: 0,
            failures: Vec::new(),
            cancelled: false,
            elapsed: Duration::ZERO,
        };
        let mut staged: Vec<Tile> = Vec::new();
        let mut last_complete: Option<u8> = None;

        for range in &plan.ranges {
            let outcomes = self.build_level(layer, range, resampling, cancel, &done, total, progress);

            let mut level_failures = 0;
            let mut level_skipped = 0;
            for outcome in outcomes {
                match outcome {
                    TileOutcome::Built(tile) => match self.config.failure_policy {
                        FailurePolicy::BestEffort => self.write(index, tile, &mut report)?,
                        FailurePolicy::AllOrNothing => staged.push(tile),
                    },
                    TileOutcome::Failed(failure) => {
                        if self.config.failure_policy == FailurePolicy::AllOrNothing {
                            return Err(BuildError::TileFailed {
                                coord: failure.coord,
                                reason: failure.reason,
                            });
                        }
                        warn!(
                            layer = %layer.id(),
                            tile = %failure.coord,
                            reason = failure.reason.as_str(),
                            "Skipping tile"
                        );
                        level_failures += 1;
                        report.failures.push(failure);
                    }
                    TileOutcome::Skipped => level_skipped += 1,
                }
            }

            debug!(
                layer = %layer.id(),
                zoom = range.zoom,
                tiles = range.len(),
                failed = level_failures,
                skipped = level_skipped,
                "Zoom level processed"
            );

            if cancel.is_cancelled() || level_skipped > 0 {
                report.cancelled = true;
                break;
            }
            last_complete = Some(range.zoom);
        }

        if report.cancelled && self.config.failure_policy == FailurePolicy::AllOrNothing {
            for tile in staged {
                self.recycle(tile);
            }
            return Err(BuildError::Cancelled);
        }
        for tile in staged {
            self.write(index, tile, &mut report)?;
        }

        report.zoom_range = match last_complete {
            Some(max) => Some(ZoomRange::new(plan.zoom_range.min.min(max), max)?),
            None => None,
        };
        if report.zoom_range.is_some() || report.tiles_written > 0 {
            index.set_zoom_range(layer.id(), report.zoom_range)?;
        }
        report.elapsed = started.elapsed();

        info!(
            layer = %layer.id(),
            written = report.tiles_written,
            replaced = report.tiles_replaced,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Tile pyramid built"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_level(
        &self,
        layer: &RasterLayer,
        range: &TileRange,
        resampling: Resampling,
        cancel: &CancellationToken,
        done: &AtomicUsize,
        total: usize,
        progress: Option<&ProgressCallback>,
    ) -> Vec<TileOutcome> {
        let coords: Vec<TileCoord> = range.iter().collect();
        self.pool.install(|| {
            coords
                .par_iter()
                .map(|coord| {
                    if cancel.is_cancelled() {
                        return TileOutcome::Skipped;
                    }
                    let outcome = match self.build_tile(layer, *coord, resampling) {
                        Ok(tile) => TileOutcome::Built(tile),
                        Err(e) => TileOutcome::Failed(TileFailure {
                            coord: *coord,
                            reason: e.to_string(),
                        }),
                    };
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(progress) = progress {
                        progress(finished, total);
                    }
                    outcome
                })
                .collect()
        })
    }

    /// Warp the source onto the canonical footprint of one tile.
    pub fn build_tile(
        &self,
        layer: &RasterLayer,
        coord: TileCoord,
        resampling: Resampling,
    ) -> Result<Tile, BuildError> {
        let size = self.config.tile_size;
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: tile_transform(&coord, size),
            width: size as usize,
            height: size as usize,
        };
        let raster = layer
            .raster()
            .warp_with_pool(&target, resampling, &self.buffers)?;
        Ok(Tile::new(TileKey::new(layer.id(), coord), raster))
    }

    fn write(&self, index: &TileIndex, tile: Tile, report: &mut BuildReport) -> Result<(), BuildError> {
        if let Some(previous) = index.insert(tile)? {
            report.tiles_replaced += 1;
            if let Ok(previous) = Arc::try_unwrap(previous) {
                self.recycle(previous);
            }
        }
        report.tiles_written += 1;
        Ok(())
    }

    /// Return a tile's pixel buffers to the pool.
    fn recycle(&self, tile: Tile) {
        for band in tile.into_raster().into_bands() {
            self.buffers.release(band.into_data());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::index::LayerKind;
    use crate::raster::srs::HALF_WORLD;
    use crate::raster::{BackingStore, Band, DataType, GeoTransform};

    /// `n`x`n` raster covering the north-east world quadrant, one value per row.
    fn layer_with_pixels(n: usize, kind: LayerKind) -> RasterLayer {
        let pixel = HALF_WORLD / n as f64;
        let data = (0..n * n).map(|i| (i / n) as f64).collect();
        let raster = GeoRaster::new(
            n,
            n,
            GeoTransform::north_up(0.0, HALF_WORLD, pixel, -pixel),
            WEB_MERCATOR_SRID,
            vec![Band::new(DataType::UInt8, n, n, data, Some(255.0)).unwrap()],
            BackingStore::File(PathBuf::from("quadrant.tif")),
        )
        .unwrap();
        RasterLayer::new(LayerId(7), "quadrant", kind, raster).unwrap()
    }

    fn quadrant_layer(kind: LayerKind) -> RasterLayer {
        layer_with_pixels(8, kind)
    }

    fn builder(config: PyramidConfig) -> PyramidBuilder {
        PyramidBuilder::new(config.with_workers(2)).unwrap()
    }

    #[test]
    fn test_plan_zoom_policies() {
        let layer = quadrant_layer(Default::default());
        // Source pixel is HALF_WORLD / 8; a 4-pixel tile at zoom z has pixel
        // WORLD / (4 * 2^z), equal at z = 2.
        let down = builder(PyramidConfig::default().with_tile_size(4));
        let plan = down.plan(layer.raster()).unwrap();
        assert_eq!(plan.zoom_range, ZoomRange::new(0, 2).unwrap());
        // Zoom 0: 1 tile, zoom 1: 1 tile, zoom 2: 2x2 tiles.
        assert_eq!(plan.tile_count(), 6);

        // With source pixels of HALF_WORLD / 6, 4-pixel tiles are coarser
        // at z=1 and finer at z=2.
        let odd = layer_with_pixels(6, LayerKind::Continuous);
        assert_eq!(down.plan(odd.raster()).unwrap().zoom_range.max, 1);
        let up = builder(
            PyramidConfig::default()
                .with_tile_size(4)
                .with_zoom_policy(ZoomPolicy::Up),
        );
        assert_eq!(up.plan(odd.raster()).unwrap().zoom_range.max, 2);
    }

    #[test]
    fn test_min_zoom_is_clamped() {
        let layer = quadrant_layer(Default::default());
        let b = builder(PyramidConfig::default().with_tile_size(4).with_min_zoom(9));
        let plan = b.plan(layer.raster()).unwrap();
        assert_eq!(plan.zoom_range, ZoomRange::new(2, 2).unwrap());
    }

    #[test]
    fn test_build_writes_every_planned_tile() {
        let layer = quadrant_layer(Default::default());
        let index = TileIndex::new();
        let b = builder(PyramidConfig::default().with_tile_size(4));
        let report = b.build(&layer, &index, &CancellationToken::new(), None).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.tiles_written, 6);
        assert_eq!(report.tiles_replaced, 0);
        assert_eq!(index.tile_count(layer.id()).unwrap(), 6);
        assert_eq!(index.zoom_range(layer.id()).unwrap(), Some(ZoomRange::new(0, 2).unwrap()));

        for tile in index.list(layer.id(), 2).unwrap() {
            assert_eq!(tile.raster().width(), 4);
            assert_eq!(tile.raster().height(), 4);
            assert_eq!(tile.raster().transform(), &tile_transform(&tile.coord(), 4));
        }

        // Zoom 2 tile (3, 3) is the top-right corner: rows 0..4 hold 0..3.
        let corner = index.lookup(layer.id(), TileCoord::new(2, 3, 3).unwrap()).unwrap();
        assert_eq!(corner.band().unwrap().data()[..4], [0.0; 4]);
        assert_eq!(corner.band().unwrap().data()[12..], [3.0; 4]);
    }

    #[test]
    fn test_values_equal_to_default_sentinel_survive_tiling() {
        let pixel = HALF_WORLD / 4.0;
        let raster = GeoRaster::new(
            4,
            4,
            GeoTransform::north_up(0.0, HALF_WORLD, pixel, -pixel),
            WEB_MERCATOR_SRID,
            vec![Band::filled(DataType::UInt8, 4, 4, 255.0, None)],
            BackingStore::File(PathBuf::from("saturated.tif")),
        )
        .unwrap();
        let layer = RasterLayer::new(LayerId(8), "saturated", LayerKind::Categorical, raster).unwrap();
        let index = TileIndex::new();
        let b = builder(PyramidConfig::default().with_tile_size(4));
        let report = b.build(&layer, &index, &CancellationToken::new(), None).unwrap();
        assert_eq!(report.zoom_range, Some(ZoomRange::new(0, 1).unwrap()));

        let tiles: Vec<Arc<Tile>> = index.list(layer.id(), 1).unwrap().collect();
        assert_eq!(tiles.len(), 1);
        let histogram = crate::aggregate::aggregate(&tiles, &crate::aggregate::Binning::Categorical).unwrap();
        assert_eq!(histogram.get(&crate::aggregate::Bucket::Value(255.0)), 16);
        assert_eq!(histogram.nodata(), 0);

        // Zoom 0 shows the layer in one quadrant; the rest is fill.
        let world = index.lookup(layer.id(), TileCoord::new(0, 0, 0).unwrap()).unwrap();
        let band = world.band().unwrap();
        assert_eq!(band.dtype(), DataType::Int16);
        assert_eq!(band.valid_count(), 4);
        assert_eq!(band.data().iter().filter(|v| **v == 255.0).count(), 4);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let layer = quadrant_layer(Default::default());
        let index = TileIndex::new();
        let b = builder(PyramidConfig::default().with_tile_size(4));
        b.build(&layer, &index, &CancellationToken::new(), None).unwrap();
        let before: Vec<Vec<f64>> = index
            .list(layer.id(), 2)
            .unwrap()
            .map(|t| t.band().unwrap().data().to_vec())
            .collect();

        let report = b.build(&layer, &index, &CancellationToken::new(), None).unwrap();
        assert_eq!(report.tiles_replaced, 6);
        assert_eq!(index.tile_count(layer.id()).unwrap(), 6);
        let after: Vec<Vec<f64>> = index
            .list(layer.id(), 2)
            .unwrap()
            .map(|t| t.band().unwrap().data().to_vec())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_cancel_before_start() {
        let layer = quadrant_layer(Default::default());
        let index = TileIndex::new();
        let b = builder(PyramidConfig::default().with_tile_size(4));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = b.build(&layer, &index, &cancel, None).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.tiles_written, 0);
        assert_eq!(report.zoom_range, None);
        // The layer is registered but empty.
        assert_eq!(index.tile_count(layer.id()).unwrap(), 0);
    }

    #[test]
    fn test_cancel_all_or_nothing_writes_nothing() {
        let layer = quadrant_layer(Default::default());
        let index = TileIndex::new();
        let b = builder(
            PyramidConfig::default()
                .with_tile_size(4)
                .with_failure_policy(FailurePolicy::AllOrNothing),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            b.build(&layer, &index, &cancel, None),
            Err(BuildError::Cancelled)
        ));
        assert_eq!(index.tile_count(layer.id()).unwrap(), 0);
    }

    #[test]
    fn test_progress_reports_every_tile() {
        let layer = quadrant_layer(Default::default());
        let index = TileIndex::new();
        let b = builder(PyramidConfig::default().with_tile_size(4));
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let progress: &ProgressCallback =
            &move |done, total| sink.lock().unwrap().push((done, total));

        b.build(&layer, &index, &CancellationToken::new(), Some(progress))
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&(6, 6)));
    }

    #[test]
    fn test_replaced_tiles_are_recycled() {
        let layer = quadrant_layer(Default::default());
        let index = TileIndex::new();
        let b = builder(PyramidConfig::default().with_tile_size(4));
        b.build(&layer, &index, &CancellationToken::new(), None).unwrap();
        b.build(&layer, &index, &CancellationToken::new(), None).unwrap();
        // The replaced zoom 0 tile's buffer is reused for zoom 1.
        assert!(b.buffers().stats().reused > 0);
    }
}
