//! Spatial reference handling.
//!
//! Only the analytic EPSG:4326 (lon/lat degrees) and EPSG:3857 (Web Mercator
//! metres) pair is supported. Any other pair of distinct SRIDs is rejected.

use std::f64::consts::PI;

use super::RasterError;

/// Geographic WGS84 longitude/latitude.
pub const WGS84_SRID: u32 = 4326;

/// Spherical Web Mercator.
pub const WEB_MERCATOR_SRID: u32 = 3857;

/// Sphere radius used by Web Mercator, in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the Web Mercator world square, in metres.
pub const HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Web Mercator latitude limit in degrees.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Converts longitude/latitude degrees to Web Mercator metres.
///
/// Latitudes beyond the Mercator limit are clamped.
#[inline]
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

/// Converts Web Mercator metres to longitude/latitude degrees.
#[inline]
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// A resolved point transformation between two spatial references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reprojection {
    Identity,
    LonLatToMercator,
    MercatorToLonLat,
}

impl Reprojection {
    /// Resolve the transformation from `from` to `to`.
    pub fn between(from: u32, to: u32) -> Result<Self, RasterError> {
        match (from, to) {
            (a, b) if a == b => Ok(Reprojection::Identity),
            (WGS84_SRID, WEB_MERCATOR_SRID) => Ok(Reprojection::LonLatToMercator),
            (WEB_MERCATOR_SRID, WGS84_SRID) => Ok(Reprojection::MercatorToLonLat),
            _ => Err(RasterError::UnsupportedTransform { from, to }),
        }
    }

    #[inline]
    pub fn apply(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Reprojection::Identity => (x, y),
            Reprojection::LonLatToMercator => lonlat_to_mercator(x, y),
            Reprojection::MercatorToLonLat => mercator_to_lonlat(x, y),
        }
    }
}

/// Transform a single point between spatial references.
pub fn reproject(from: u32, to: u32, x: f64, y: f64) -> Result<(f64, f64), RasterError> {
    Ok(Reprojection::between(from, to)?.apply(x, y))
}
