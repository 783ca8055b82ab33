//! Single raster band: typed pixel buffer plus its nodata sentinel.

use super::{DataType, RasterError, Window};

/// One band of pixels, stored row-major.
///
/// Every pixel is either the nodata sentinel or a value representable in the
/// band's data type.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    dtype: DataType,
    nodata: Option<f64>,
    width: usize,
    height: usize,
    data: Vec<f64>,
    fill: (DataType, f64),
}

impl Band {
    /// Create a band, checking that the buffer matches `width * height` and
    /// that every pixel fits `dtype`.
    ///
    /// `Float32` values are rounded to single precision. Integer types reject
    /// fractional, out-of-range and NaN values that are not the nodata value.
    pub fn new(
        dtype: DataType,
        width: usize,
        height: usize,
        mut data: Vec<f64>,
        nodata: Option<f64>,
    ) -> Result<Self, RasterError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(RasterError::InvalidBuffer {
                expected,
                actual: data.len(),
            });
        }
        for (index, value) in data.iter_mut().enumerate() {
            if matches_nodata(nodata, *value) {
                continue;
            }
            match dtype {
                DataType::Float64 => {}
                DataType::Float32 => *value = dtype.cast(*value),
                _ if dtype.fits(*value) => {}
                _ => {
                    return Err(RasterError::ValueNotRepresentable {
                        index,
                        value: *value,
                        dtype,
                    })
                }
            }
        }
        let fill = outside_fill(dtype, nodata, &data);
        Ok(Self {
            dtype,
            nodata,
            width,
            height,
            data,
            fill,
        })
    }

    /// Band of `width * height` pixels all set to `value`, which must be
    /// representable in `dtype` or equal to `nodata`.
    pub fn filled(
        dtype: DataType,
        width: usize,
        height: usize,
        value: f64,
        nodata: Option<f64>,
    ) -> Self {
        debug_assert!(
            matches_nodata(nodata, value) || dtype.fits(value) || dtype.is_float(),
            "{} does not fit {}",
            value,
            dtype
        );
        let data = vec![value; width * height];
        let fill = outside_fill(dtype, nodata, &data);
        Self {
            dtype,
            nodata,
            width,
            height,
            data,
            fill,
        }
    }

    /// Data type and sentinel that a resampled copy of this band uses for
    /// pixels with no source value.
    ///
    /// This is the declared nodata when there is one. Otherwise it is the
    /// type's default sentinel, unless a valid pixel already holds that value.
    /// In that case the copy moves to a wider type whose default sentinel lies
    /// outside this type's range.
    pub fn fill(&self) -> (DataType, f64) {
        self.fill
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Pixel value at (col, row), if inside the band.
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Whether `value` is this band's nodata sentinel.
    ///
    /// A NaN sentinel matches NaN pixels; otherwise matching is exact.
    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        matches_nodata(self.nodata, value)
    }

    /// Number of pixels that are not nodata.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }

    /// Copy a window of pixels out of the band, row-major.
    pub fn read(&self, window: Window) -> Result<Vec<f64>, RasterError> {
        if window.col + window.width > self.width || window.row + window.height > self.height {
            return Err(RasterError::WindowOutOfBounds {
                col: window.col,
                row: window.row,
                width: window.width,
                height: window.height,
                raster_width: self.width,
                raster_height: self.height,
            });
        }
        let mut out = Vec::with_capacity(window.width * window.height);
        for row in window.row..window.row + window.height {
            let start = row * self.width + window.col;
            out.extend_from_slice(&self.data[start..start + window.width]);
        }
        Ok(out)
    }
}

#[inline]
fn matches_nodata(nodata: Option<f64>, value: f64) -> bool {
    match nodata {
        Some(nodata) if nodata.is_nan() => value.is_nan(),
        Some(nodata) => value == nodata,
        None => false,
    }
}

fn outside_fill(dtype: DataType, nodata: Option<f64>, data: &[f64]) -> (DataType, f64) {
    if let Some(nodata) = nodata {
        return (dtype, nodata);
    }
    let default = dtype.default_nodata();
    if !data.contains(&default) {
        return (dtype, default);
    }
    let wider = match dtype {
        DataType::UInt8 | DataType::Int8 => DataType::Int16,
        DataType::UInt16 | DataType::Int16 => DataType::Int32,
        DataType::UInt32 | DataType::Int32 | DataType::Float32 => DataType::Float64,
        DataType::Float64 => return (DataType::Float64, f64::NAN),
    };
    (wider, wider.default_nodata())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_band() -> Band {
        let data = (0..12).map(|v| v as f64).collect();
        Band::new(DataType::UInt8, 4, 3, data, Some(255.0)).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let result = Band::new(DataType::UInt8, 4, 4, vec![0.0; 15], None);
        assert!(matches!(
            result,
            Err(RasterError::InvalidBuffer {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn test_new_rejects_values_outside_integer_type() {
        let fractional = Band::new(DataType::UInt8, 2, 1, vec![1.0, 2.9], None);
        assert!(matches!(
            fractional,
            Err(RasterError::ValueNotRepresentable { index: 1, dtype: DataType::UInt8, .. })
        ));
        assert!(Band::new(DataType::UInt8, 1, 1, vec![256.0], None).is_err());
        assert!(Band::new(DataType::Int16, 1, 1, vec![f64::NAN], None).is_err());
    }

    #[test]
    fn test_new_accepts_nodata_outside_type() {
        let band = Band::new(DataType::UInt8, 2, 1, vec![3.0, -9999.0], Some(-9999.0)).unwrap();
        assert_eq!(band.valid_count(), 1);
    }

    #[test]
    fn test_new_rounds_float32() {
        let band = Band::new(DataType::Float32, 2, 1, vec![0.5, 2.9], None).unwrap();
        assert_eq!(band.data(), &[0.5, 2.9f32 as f64]);
    }

    #[test]
    fn test_fill_uses_declared_nodata() {
        assert_eq!(sample_band().fill(), (DataType::UInt8, 255.0));
    }

    #[test]
    fn test_fill_avoids_values_in_use() {
        let unused = Band::new(DataType::UInt8, 2, 1, vec![1.0, 2.0], None).unwrap();
        assert_eq!(unused.fill(), (DataType::UInt8, 255.0));

        let saturated = Band::new(DataType::UInt8, 2, 1, vec![0.0, 255.0], None).unwrap();
        assert_eq!(saturated.fill(), (DataType::Int16, -32768.0));

        let wide = Band::new(DataType::Int32, 1, 1, vec![i32::MIN as f64], None).unwrap();
        assert_eq!(wide.fill(), (DataType::Float64, f64::MIN));
    }

    #[test]
    fn test_read_window() {
        let band = sample_band();
        let values = band.read(Window::new(1, 1, 2, 2)).unwrap();
        assert_eq!(values, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_read_full_window() {
        let band = sample_band();
        assert_eq!(band.read(Window::full(4, 3)).unwrap(), band.data());
    }

    #[test]
    fn test_read_window_out_of_bounds() {
        let band = sample_band();
        let result = band.read(Window::new(3, 0, 2, 1));
        assert!(matches!(result, Err(RasterError::WindowOutOfBounds { .. })));
    }

    #[test]
    fn test_is_nodata_exact() {
        let band = sample_band();
        assert!(band.is_nodata(255.0));
        assert!(!band.is_nodata(254.0));
    }

    #[test]
    fn test_is_nodata_nan_sentinel() {
        let band = Band::filled(DataType::Float32, 2, 2, f64::NAN, Some(f64::NAN));
        assert!(band.is_nodata(f64::NAN));
        assert_eq!(band.valid_count(), 0);
    }

    #[test]
    fn test_get() {
        let band = sample_band();
        assert_eq!(band.get(3, 2), Some(11.0));
        assert_eq!(band.get(4, 0), None);
    }
}
