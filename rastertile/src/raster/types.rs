//! Core raster value types: pixel data types, affine transforms, extents
//! and pixel windows.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RasterError;

/// Pixel data type of a band.
///
/// Pixel values are held as `f64` in memory; the data type records the range
/// the values are constrained to and drives numeric promotion in band algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Width of the type in bits.
    pub fn bits(self) -> u32 {
        match self {
            DataType::UInt8 | DataType::Int8 => 8,
            DataType::UInt16 | DataType::Int16 => 16,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 32,
            DataType::Float64 => 64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, DataType::UInt8 | DataType::UInt16 | DataType::UInt32)
    }

    /// Smallest representable value.
    pub fn min_value(self) -> f64 {
        match self {
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => 0.0,
            DataType::Int8 => i8::MIN as f64,
            DataType::Int16 => i16::MIN as f64,
            DataType::Int32 => i32::MIN as f64,
            DataType::Float32 => f32::MIN as f64,
            DataType::Float64 => f64::MIN,
        }
    }

    /// Largest representable value.
    pub fn max_value(self) -> f64 {
        match self {
            DataType::UInt8 => u8::MAX as f64,
            DataType::UInt16 => u16::MAX as f64,
            DataType::UInt32 => u32::MAX as f64,
            DataType::Int8 => i8::MAX as f64,
            DataType::Int16 => i16::MAX as f64,
            DataType::Int32 => i32::MAX as f64,
            DataType::Float32 => f32::MAX as f64,
            DataType::Float64 => f64::MAX,
        }
    }

    /// Sentinel used when a band needs a nodata value but declares none.
    ///
    /// Unsigned types use their maximum, signed integers and floats their minimum.
    pub fn default_nodata(self) -> f64 {
        if self.is_signed() {
            self.min_value()
        } else {
            self.max_value()
        }
    }

    /// Whether `value` is exactly representable in this type.
    pub fn fits(self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self {
            DataType::Float64 => return true,
            DataType::Float32 => return value.is_infinite() || value as f32 as f64 == value,
            _ => {}
        }
        value.fract() == 0.0 && value >= self.min_value() && value <= self.max_value()
    }

    /// Convert an `f64` into this type's range.
    ///
    /// Integer targets truncate toward zero and saturate at the type bounds,
    /// `Float32` rounds to single precision.
    pub fn cast(self, value: f64) -> f64 {
        match self {
            DataType::Float64 => value,
            DataType::Float32 => value as f32 as f64,
            _ => value.trunc().clamp(self.min_value(), self.max_value()),
        }
    }

    /// Result type of combining two band types in arithmetic.
    ///
    /// Follows the usual array-library rules: the wider of two like types wins,
    /// mixed signedness widens to a signed type able to hold both, and an
    /// integer mixed with `Float32` stays single precision only for integers of
    /// up to 16 bits.
    pub fn promote(self, other: DataType) -> DataType {
        if self == other {
            return self;
        }
        match (self.is_float(), other.is_float()) {
            (true, true) => {
                if self.bits() >= other.bits() {
                    self
                } else {
                    other
                }
            }
            (true, false) => float_with_int(self, other),
            (false, true) => float_with_int(other, self),
            (false, false) => {
                if self.is_signed() == other.is_signed() {
                    if self.bits() >= other.bits() {
                        self
                    } else {
                        other
                    }
                } else {
                    let (signed, unsigned) = if self.is_signed() {
                        (self, other)
                    } else {
                        (other, self)
                    };
                    if signed.bits() > unsigned.bits() {
                        signed
                    } else {
                        match unsigned.bits() {
                            8 => DataType::Int16,
                            16 => DataType::Int32,
                            _ => DataType::Float64,
                        }
                    }
                }
            }
        }
    }

    /// Floating point type able to hold results derived from this type.
    pub fn to_float(self) -> DataType {
        match self {
            DataType::Float32 | DataType::UInt8 | DataType::Int8 => DataType::Float32,
            DataType::UInt16 | DataType::Int16 => DataType::Float32,
            _ => DataType::Float64,
        }
    }

    /// Smallest integer type holding `0`, `1` and `nodata`, used for boolean results.
    pub fn boolean_for(nodata: f64) -> DataType {
        [
            DataType::UInt8,
            DataType::Int16,
            DataType::Int32,
            DataType::Float32,
        ]
        .into_iter()
        .find(|dtype| dtype.fits(nodata))
        .unwrap_or(DataType::Float64)
    }
}

fn float_with_int(float: DataType, int: DataType) -> DataType {
    if float == DataType::Float32 && int.bits() <= 16 {
        DataType::Float32
    } else {
        DataType::Float64
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::UInt8 => "uint8",
            DataType::Int8 => "int8",
            DataType::UInt16 => "uint16",
            DataType::Int16 => "int16",
            DataType::UInt32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Affine transform from pixel space to world coordinates.
///
/// ```text
/// x = origin_x + col * scale_x + row * skew_x
/// y = origin_y + col * skew_y  + row * scale_y
/// ```
///
/// North-up rasters have zero skew and a negative `scale_y`, but nothing in
/// this crate relies on that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
}

impl GeoTransform {
    /// North-up transform without skew.
    pub fn north_up(origin_x: f64, origin_y: f64, scale_x: f64, scale_y: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            scale_x,
            scale_y,
            skew_x: 0.0,
            skew_y: 0.0,
        }
    }

    /// Build from the six GDAL coefficients
    /// `[origin_x, scale_x, skew_x, origin_y, skew_y, scale_y]`.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            scale_x: coeffs[1],
            skew_x: coeffs[2],
            origin_y: coeffs[3],
            skew_y: coeffs[4],
            scale_y: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.scale_x,
            self.skew_x,
            self.origin_y,
            self.skew_y,
            self.scale_y,
        ]
    }

    /// World coordinates of a (fractional) pixel position.
    #[inline]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.scale_x + row * self.skew_x,
            self.origin_y + col * self.skew_y + row * self.scale_y,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.scale_x * self.scale_y - self.skew_x * self.skew_y
    }

    /// Area covered by one pixel, in squared world units.
    pub fn pixel_area(&self) -> f64 {
        self.determinant().abs()
    }

    /// Inverse mapping, world coordinates to fractional pixel position.
    pub fn inverse(&self) -> Result<InverseTransform, RasterError> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(RasterError::SingularTransform);
        }
        Ok(InverseTransform {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            a: self.scale_y / det,
            b: -self.skew_x / det,
            c: -self.skew_y / det,
            d: self.scale_x / det,
        })
    }
}

/// Precomputed inverse of a [`GeoTransform`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseTransform {
    origin_x: f64,
    origin_y: f64,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl InverseTransform {
    /// Fractional (col, row) of a world position.
    #[inline]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        (self.a * dx + self.b * dy, self.c * dx + self.d * dy)
    }
}

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest extent containing every point.
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut extent = Extent::new(x, y, x, y);
        for (x, y) in iter {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        Some(extent)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether the point lies inside (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether the two extents share area (touching edges do not count).
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Rectangular pixel window of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col: usize, row: usize, width: usize, height: usize) -> Self {
        Self {
            col,
            row,
            width,
            height,
        }
    }

    /// Window covering a whole raster.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_same_type() {
        assert_eq!(DataType::UInt8.promote(DataType::UInt8), DataType::UInt8);
    }

    #[test]
    fn test_promote_wider_integer_wins() {
        assert_eq!(DataType::UInt8.promote(DataType::UInt16), DataType::UInt16);
        assert_eq!(DataType::Int32.promote(DataType::Int8), DataType::Int32);
    }

    #[test]
    fn test_promote_mixed_signedness() {
        assert_eq!(DataType::UInt8.promote(DataType::Int8), DataType::Int16);
        assert_eq!(DataType::UInt16.promote(DataType::Int16), DataType::Int32);
        assert_eq!(DataType::UInt8.promote(DataType::Int16), DataType::Int16);
        assert_eq!(DataType::UInt32.promote(DataType::Int32), DataType::Float64);
    }

    #[test]
    fn test_promote_float_with_int() {
        assert_eq!(DataType::Float32.promote(DataType::UInt8), DataType::Float32);
        assert_eq!(DataType::Float32.promote(DataType::Int32), DataType::Float64);
        assert_eq!(DataType::Int16.promote(DataType::Float64), DataType::Float64);
    }

    #[test]
    fn test_promote_is_symmetric() {
        let all = [
            DataType::UInt8,
            DataType::Int8,
            DataType::UInt16,
            DataType::Int16,
            DataType::UInt32,
            DataType::Int32,
            DataType::Float32,
            DataType::Float64,
        ];
        for a in all {
            for b in all {
                assert_eq!(a.promote(b), b.promote(a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_cast_saturates_and_truncates() {
        assert_eq!(DataType::UInt8.cast(300.0), 255.0);
        assert_eq!(DataType::UInt8.cast(-4.0), 0.0);
        assert_eq!(DataType::Int16.cast(-2.7), -2.0);
        assert_eq!(DataType::Float64.cast(0.1), 0.1);
    }

    #[test]
    fn test_fits() {
        assert!(DataType::UInt8.fits(255.0));
        assert!(!DataType::UInt8.fits(256.0));
        assert!(!DataType::UInt8.fits(1.5));
        assert!(DataType::Float32.fits(-9999.0));
        assert!(!DataType::Float32.fits(f64::NAN));
    }

    #[test]
    fn test_default_nodata() {
        assert_eq!(DataType::UInt8.default_nodata(), 255.0);
        assert_eq!(DataType::Int16.default_nodata(), -32768.0);
    }

    #[test]
    fn test_boolean_for_nodata() {
        assert_eq!(DataType::boolean_for(255.0), DataType::UInt8);
        assert_eq!(DataType::boolean_for(-1.0), DataType::Int16);
        assert_eq!(DataType::boolean_for(-9999.5), DataType::Float32);
    }

    #[test]
    fn test_transform_roundtrip_with_skew() {
        let gt = GeoTransform {
            origin_x: 100.0,
            origin_y: 200.0,
            scale_x: 2.0,
            scale_y: -2.0,
            skew_x: 0.5,
            skew_y: 0.25,
        };
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.pixel_to_world(10.0, 7.0);
        let (col, row) = inv.world_to_pixel(x, y);
        assert!((col - 10.0).abs() < 1e-9);
        assert!((row - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_transform() {
        let gt = GeoTransform::north_up(0.0, 0.0, 0.0, -1.0);
        assert!(matches!(gt.inverse(), Err(RasterError::SingularTransform)));
    }

    #[test]
    fn test_gdal_coefficients_roundtrip() {
        let coeffs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(GeoTransform::from_gdal(coeffs).to_gdal(), coeffs);
    }

    #[test]
    fn test_extent_from_points() {
        let extent = Extent::from_points([(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)]).unwrap();
        assert_eq!(extent, Extent::new(-2.0, -1.0, 4.0, 5.0));
        assert!(Extent::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_extent_intersects_excludes_touching() {
        let a = Extent::new(0.0, 0.0, 1.0, 1.0);
        let b = Extent::new(1.0, 0.0, 2.0, 1.0);
        let c = Extent::new(0.5, 0.5, 1.5, 1.5);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
    }
}
