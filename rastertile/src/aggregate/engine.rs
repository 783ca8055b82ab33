//! Parallel map/reduce over tiles.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use super::{AggregateError, Binning, Histogram, Moments, Statistics};
use crate::index::Tile;
use crate::raster::{Band, Extent, GeoTransform};
use crate::workers::WorkerPool;

/// Where a pixel centre falls relative to a clip extent.
enum Clip<'a> {
    /// Every pixel counts.
    All,
    /// No pixel counts.
    Nothing,
    /// Test each pixel centre.
    Test(&'a Extent),
}

impl<'a> Clip<'a> {
    fn for_raster(clip: Option<&'a Extent>, raster_extent: &Extent) -> Self {
        match clip {
            None => Clip::All,
            Some(c)
                if c.contains(raster_extent.min_x, raster_extent.min_y)
                    && c.contains(raster_extent.max_x, raster_extent.max_y) =>
            {
                Clip::All
            }
            Some(c) if !c.intersects(raster_extent) => Clip::Nothing,
            Some(c) => Clip::Test(c),
        }
    }
}

/// Histogram of one band.
///
/// `transform` places pixels in the world for clipping; pixels whose centre
/// falls outside `clip` are counted as clipped before nodata is considered.
pub fn count_band(
    band: &Band,
    transform: &GeoTransform,
    binning: &Binning,
    clip: Option<&Extent>,
) -> Histogram {
    let mut histogram = Histogram::new();
    let corners = [
        transform.pixel_to_world(0.0, 0.0),
        transform.pixel_to_world(band.width() as f64, 0.0),
        transform.pixel_to_world(0.0, band.height() as f64),
        transform.pixel_to_world(band.width() as f64, band.height() as f64),
    ];
    let clip = match Extent::from_points(corners) {
        Some(extent) => Clip::for_raster(clip, &extent),
        None => Clip::All,
    };

    for row in 0..band.height() {
        for col in 0..band.width() {
            let value = band.data()[row * band.width() + col];
            match clip {
                Clip::All => {}
                Clip::Nothing => {
                    histogram.count_clipped();
                    continue;
                }
                Clip::Test(extent) => {
                    let (x, y) = transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
                    if !extent.contains(x, y) {
                        histogram.count_clipped();
                        continue;
                    }
                }
            }
            if band.is_nodata(value) || value.is_nan() {
                histogram.count_nodata();
                continue;
            }
            match binning.bucket(value) {
                Some(bucket) => histogram.count(bucket),
                None => histogram.count_unmatched(),
            }
        }
    }
    histogram
}

/// Moments of the valid pixels of one band inside `clip`.
pub fn band_moments(band: &Band, transform: &GeoTransform, clip: Option<&Extent>) -> Moments {
    let mut moments = Moments::new();
    for row in 0..band.height() {
        for col in 0..band.width() {
            let value = band.data()[row * band.width() + col];
            if band.is_nodata(value) || value.is_nan() {
                continue;
            }
            if let Some(extent) = clip {
                let (x, y) = transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
                if !extent.contains(x, y) {
                    continue;
                }
            }
            moments.push(value);
        }
    }
    moments
}

fn tile_histogram(
    tile: &Tile,
    binning: &Binning,
    clip: Option<&Extent>,
) -> Result<Histogram, AggregateError> {
    let band = tile.band()?;
    Ok(count_band(band, tile.raster().transform(), binning, clip))
}

/// Aggregate tiles on the global rayon pool.
pub fn aggregate(tiles: &[Arc<Tile>], binning: &Binning) -> Result<Histogram, AggregateError> {
    aggregate_clipped(tiles, binning, None)
}

/// Aggregate tiles on the global rayon pool, counting only pixels whose
/// centre lies inside `clip`.
pub fn aggregate_clipped(
    tiles: &[Arc<Tile>],
    binning: &Binning,
    clip: Option<&Extent>,
) -> Result<Histogram, AggregateError> {
    tiles
        .par_iter()
        .map(|tile| tile_histogram(tile, binning, clip))
        .try_reduce(Histogram::new, |a, b| Ok(a.merged(b)))
}

/// Aggregations on a dedicated, bounded worker pool.
#[derive(Debug)]
pub struct AggregationEngine {
    pool: WorkerPool,
}

impl AggregationEngine {
    /// Start an engine with `workers` threads (`0` = one per core).
    pub fn new(workers: usize) -> Result<Self, AggregateError> {
        Ok(Self {
            pool: WorkerPool::new(workers, "aggregate")?,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.threads()
    }

    pub fn aggregate(
        &self,
        tiles: &[Arc<Tile>],
        binning: &Binning,
        clip: Option<&Extent>,
    ) -> Result<Histogram, AggregateError> {
        let histogram = self
            .pool
            .install(|| aggregate_clipped(tiles, binning, clip))?;
        debug!(
            tiles = tiles.len(),
            counted = histogram.counted(),
            nodata = histogram.nodata(),
            clipped = histogram.clipped(),
            "Aggregated tiles"
        );
        Ok(histogram)
    }

    /// Statistics of the valid pixels across tiles, `None` when there are none.
    pub fn statistics(
        &self,
        tiles: &[Arc<Tile>],
        clip: Option<&Extent>,
    ) -> Result<Option<Statistics>, AggregateError> {
        let moments = self.pool.install(|| {
            tiles
                .par_iter()
                .map(|tile| -> Result<Moments, AggregateError> {
                    Ok(band_moments(tile.band()?, tile.raster().transform(), clip))
                })
                .try_reduce(Moments::new, |a, b| Ok(a.merged(b)))
        })?;
        Ok(moments.statistics())
    }
}
