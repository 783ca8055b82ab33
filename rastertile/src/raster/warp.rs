//! Resampling a raster onto another grid.
//!
//! Every target pixel centre is taken to world coordinates through the target
//! transform, reprojected into the source SRS, and located in the source grid
//! through the inverse source transform. Nodata never leaks into valid pixels:
//! bilinear falls back to nearest next to nodata and majority only counts
//! valid pixels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::srs::Reprojection;
use super::{BackingStore, Band, BufferPool, GeoRaster, GeoTransform, RasterError};

/// Pixel resampling algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Value of the source pixel containing the target centre.
    #[default]
    Nearest,
    /// Distance-weighted mean of the four nearest source pixel centres.
    Bilinear,
    /// Most frequent valid value under the target pixel's footprint.
    Majority,
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Majority => "majority",
        };
        f.write_str(name)
    }
}

impl FromStr for Resampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(Resampling::Nearest),
            "bilinear" => Ok(Resampling::Bilinear),
            "majority" | "mode" => Ok(Resampling::Majority),
            other => Err(format!("unknown resampling '{}'", other)),
        }
    }
}

/// Grid a raster is warped onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpTarget {
    pub srid: u32,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

pub(crate) fn warp_raster(
    source: &GeoRaster,
    target: &WarpTarget,
    resampling: Resampling,
    pool: &BufferPool,
) -> Result<GeoRaster, RasterError> {
    let reprojection = Reprojection::between(target.srid, source.srid())?;
    let inverse = source.transform().inverse()?;
    let to_source = |col: f64, row: f64| {
        let (x, y) = target.transform.pixel_to_world(col, row);
        let (x, y) = reprojection.apply(x, y);
        inverse.world_to_pixel(x, y)
    };

    let (w, h) = (target.width, target.height);
    let centres: Vec<(f64, f64)> = (0..h)
        .flat_map(|row| (0..w).map(move |col| (col as f64 + 0.5, row as f64 + 0.5)))
        .map(|(col, row)| to_source(col, row))
        .collect();

    // Majority needs each target pixel's footprint, kept as the grid of
    // target pixel corners in source pixel space.
    let corners: Vec<(f64, f64)> = if resampling == Resampling::Majority {
        (0..=h)
            .flat_map(|row| (0..=w).map(move |col| (col as f64, row as f64)))
            .map(|(col, row)| to_source(col, row))
            .collect()
    } else {
        Vec::new()
    };

    let mut bands = Vec::with_capacity(source.band_count());
    for band in source.bands() {
        let (dtype, nodata) = band.fill();
        let sampler = Sampler { band, nodata };
        let mut out = pool.acquire(w * h);
        match resampling {
            Resampling::Nearest => {
                out.extend(centres.iter().map(|&(c, r)| sampler.nearest(c, r)));
            }
            Resampling::Bilinear => {
                out.extend(centres.iter().map(|&(c, r)| sampler.bilinear(c, r)));
            }
            Resampling::Majority => {
                for row in 0..h {
                    for col in 0..w {
                        let footprint = [
                            corners[row * (w + 1) + col],
                            corners[row * (w + 1) + col + 1],
                            corners[(row + 1) * (w + 1) + col],
                            corners[(row + 1) * (w + 1) + col + 1],
                        ];
                        let (c, r) = centres[row * w + col];
                        out.push(sampler.majority(&footprint, c, r));
                    }
                }
            }
        }
        bands.push(Band::new(dtype, w, h, out, Some(nodata))?);
    }

    GeoRaster::new(
        w,
        h,
        target.transform,
        target.srid,
        bands,
        BackingStore::Memory,
    )
}

struct Sampler<'a> {
    band: &'a Band,
    nodata: f64,
}

impl Sampler<'_> {
    #[inline]
    fn pixel(&self, col: i64, row: i64) -> Option<f64> {
        if col < 0 || row < 0 {
            return None;
        }
        self.band.get(col as usize, row as usize)
    }

    #[inline]
    fn is_valid(&self, value: f64) -> bool {
        !value.is_nan() && !self.band.is_nodata(value)
    }

    fn nearest(&self, col: f64, row: f64) -> f64 {
        if !col.is_finite() || !row.is_finite() {
            return self.nodata;
        }
        match self.pixel(col.floor() as i64, row.floor() as i64) {
            Some(value) if self.is_valid(value) => value,
            _ => self.nodata,
        }
    }

    fn bilinear(&self, col: f64, row: f64) -> f64 {
        let centre = match self.pixel(col.floor() as i64, row.floor() as i64) {
            Some(value) if col.is_finite() && row.is_finite() && self.is_valid(value) => value,
            _ => return self.nodata,
        };
        let x = col - 0.5;
        let y = row - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let max_col = self.band.width() as i64 - 1;
        let max_row = self.band.height() as i64 - 1;
        let c0 = (x0 as i64).clamp(0, max_col);
        let c1 = (x0 as i64 + 1).clamp(0, max_col);
        let r0 = (y0 as i64).clamp(0, max_row);
        let r1 = (y0 as i64 + 1).clamp(0, max_row);

        let mut neighbours = [0.0; 4];
        for (slot, (c, r)) in neighbours
            .iter_mut()
            .zip([(c0, r0), (c1, r0), (c0, r1), (c1, r1)])
        {
            match self.pixel(c, r) {
                Some(value) if self.is_valid(value) => *slot = value,
                _ => return centre,
            }
        }
        let top = neighbours[0] * (1.0 - fx) + neighbours[1] * fx;
        let bottom = neighbours[2] * (1.0 - fx) + neighbours[3] * fx;
        let value = top * (1.0 - fy) + bottom * fy;
        let dtype = self.band.dtype();
        if dtype.is_float() {
            dtype.cast(value)
        } else {
            dtype.cast(value.round())
        }
    }

    fn majority(&self, footprint: &[(f64, f64); 4], col: f64, row: f64) -> f64 {
        let min_c = footprint.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_c = footprint.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let min_r = footprint.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_r = footprint.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        if !(min_c.is_finite() && max_c.is_finite() && min_r.is_finite() && max_r.is_finite()) {
            return self.nodata;
        }

        let c0 = (min_c.round() as i64).max(0);
        let c1 = (max_c.round() as i64).min(self.band.width() as i64);
        let r0 = (min_r.round() as i64).max(0);
        let r1 = (max_r.round() as i64).min(self.band.height() as i64);
        if c1 - c0 <= 1 && r1 - r0 <= 1 {
            // Footprint within a single source pixel: plain nearest.
            return self.nearest(col, row);
        }

        let mut counts: Vec<(f64, usize)> = Vec::new();
        for r in r0..r1 {
            for c in c0..c1 {
                let Some(value) = self.pixel(c, r) else {
                    continue;
                };
                if !self.is_valid(value) {
                    continue;
                }
                match counts.iter_mut().find(|(v, _)| *v == value) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((value, 1)),
                }
            }
        }
        // Highest count wins, ties go to the smallest value.
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.total_cmp(&a.0)))
            .map(|(value, _)| value)
            .unwrap_or(self.nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::srs::{WEB_MERCATOR_SRID, WGS84_SRID};
    use crate::raster::DataType;

    fn grid(width: usize, height: usize, values: Vec<f64>, nodata: Option<f64>) -> GeoRaster {
        let band = Band::new(DataType::UInt8, width, height, values, nodata).unwrap();
        GeoRaster::new(
            width,
            height,
            GeoTransform::north_up(0.0, height as f64, 1.0, -1.0),
            WEB_MERCATOR_SRID,
            vec![band],
            BackingStore::Memory,
        )
        .unwrap()
    }

    fn same_grid_target(raster: &GeoRaster) -> WarpTarget {
        WarpTarget {
            srid: raster.srid(),
            transform: *raster.transform(),
            width: raster.width(),
            height: raster.height(),
        }
    }

    #[test]
    fn test_identity_warp_preserves_pixels() {
        let source = grid(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Some(255.0));
        for resampling in [Resampling::Nearest, Resampling::Bilinear, Resampling::Majority] {
            let warped = source.warp(&same_grid_target(&source), resampling).unwrap();
            assert_eq!(warped.band(0).unwrap().data(), source.band(0).unwrap().data());
        }
    }

    #[test]
    fn test_outside_pixels_are_nodata() {
        let source = grid(2, 2, vec![1.0; 4], Some(255.0));
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(-2.0, 2.0, 1.0, -1.0),
            width: 4,
            height: 2,
        };
        let warped = source.warp(&target, Resampling::Nearest).unwrap();
        assert_eq!(
            warped.band(0).unwrap().data(),
            &[255.0, 255.0, 1.0, 1.0, 255.0, 255.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_band_without_nodata_gets_default() {
        let source = grid(2, 2, vec![1.0; 4], None);
        let warped = source.warp(&same_grid_target(&source), Resampling::Nearest).unwrap();
        assert_eq!(warped.band(0).unwrap().nodata(), Some(255.0));
    }

    #[test]
    fn test_band_using_default_sentinel_widens() {
        let source = grid(2, 2, vec![255.0, 0.0, 255.0, 7.0], None);
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(-1.0, 2.0, 1.0, -1.0),
            width: 3,
            height: 2,
        };
        let warped = source.warp(&target, Resampling::Nearest).unwrap();
        let band = warped.band(0).unwrap();
        assert_eq!(band.dtype(), DataType::Int16);
        assert_eq!(band.nodata(), Some(-32768.0));
        assert_eq!(band.data(), &[-32768.0, 255.0, 0.0, -32768.0, 255.0, 7.0]);
        assert_eq!(band.valid_count(), 4);
    }

    #[test]
    fn test_bilinear_does_not_blend_nodata() {
        // Upsample a 2x1 raster whose right pixel is nodata.
        let source = grid(2, 1, vec![10.0, 255.0], Some(255.0));
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(0.0, 1.0, 0.5, -0.5),
            width: 4,
            height: 2,
        };
        let warped = source.warp(&target, Resampling::Bilinear).unwrap();
        let data = warped.band(0).unwrap().data();
        assert_eq!(&data[..4], &[10.0, 10.0, 255.0, 255.0]);
    }

    #[test]
    fn test_bilinear_interpolates_valid_data() {
        let source = grid(2, 1, vec![10.0, 20.0], Some(255.0));
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(0.5, 1.0, 1.0, -1.0),
            width: 1,
            height: 1,
        };
        let warped = source.warp(&target, Resampling::Bilinear).unwrap();
        assert_eq!(warped.band(0).unwrap().data(), &[15.0]);
    }

    #[test]
    fn test_majority_downsample_ignores_nodata() {
        let source = grid(
            2,
            2,
            vec![3.0, 255.0, 3.0, 7.0],
            Some(255.0),
        );
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(0.0, 2.0, 2.0, -2.0),
            width: 1,
            height: 1,
        };
        let warped = source.warp(&target, Resampling::Majority).unwrap();
        assert_eq!(warped.band(0).unwrap().data(), &[3.0]);
    }

    #[test]
    fn test_majority_all_nodata_is_nodata() {
        let source = grid(2, 2, vec![255.0; 4], Some(255.0));
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(0.0, 2.0, 2.0, -2.0),
            width: 1,
            height: 1,
        };
        let warped = source.warp(&target, Resampling::Majority).unwrap();
        assert_eq!(warped.band(0).unwrap().data(), &[255.0]);
    }

    #[test]
    fn test_warp_lonlat_source_to_mercator() {
        // One pixel per degree around the origin.
        let band = Band::new(DataType::UInt8, 2, 2, vec![1.0, 2.0, 3.0, 4.0], Some(0.0)).unwrap();
        let source = GeoRaster::new(
            2,
            2,
            GeoTransform::north_up(-1.0, 1.0, 1.0, -1.0),
            WGS84_SRID,
            vec![band],
            BackingStore::Memory,
        )
        .unwrap();
        let extent = source.extent_in(WEB_MERCATOR_SRID).unwrap();
        let target = WarpTarget {
            srid: WEB_MERCATOR_SRID,
            transform: GeoTransform::north_up(
                extent.min_x,
                extent.max_y,
                extent.width() / 2.0,
                -extent.height() / 2.0,
            ),
            width: 2,
            height: 2,
        };
        let warped = source.warp(&target, Resampling::Nearest).unwrap();
        assert_eq!(warped.band(0).unwrap().data(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(warped.srid(), WEB_MERCATOR_SRID);
    }

    #[test]
    fn test_unsupported_srid() {
        let source = grid(1, 1, vec![1.0], None);
        let target = WarpTarget {
            srid: 3086,
            ..same_grid_target(&source)
        };
        assert!(matches!(
            source.warp(&target, Resampling::Nearest),
            Err(RasterError::UnsupportedTransform { .. })
        ));
    }

    #[test]
    fn test_resampling_from_str() {
        assert_eq!("Bilinear".parse::<Resampling>().unwrap(), Resampling::Bilinear);
        assert_eq!("mode".parse::<Resampling>().unwrap(), Resampling::Majority);
        assert!("cubic".parse::<Resampling>().is_err());
    }
}
