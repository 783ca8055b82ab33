//! GeoTIFF decoding.
//!
//! Georeferencing comes from the GeoTIFF model tags: either a full
//! `ModelTransformation` matrix or a `ModelPixelScale` plus `ModelTiepoint`
//! pair. The EPSG code is taken from the GeoKey directory (projected CRS key
//! first, then geographic). Chunky multi-sample images are split into one band
//! per sample.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::{BackingStore, Band, DataType, GeoRaster, GeoTransform, RasterError, RasterSource};

const PROJECTED_CRS_GEO_KEY: u16 = 3072;
const GEOGRAPHIC_CRS_GEO_KEY: u16 = 2048;

/// A GeoTIFF file on disk.
#[derive(Debug, Clone)]
pub struct GeoTiffSource {
    path: PathBuf,
}

impl GeoTiffSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable(&self, reason: impl ToString) -> RasterError {
        RasterError::SourceUnreadable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl RasterSource for GeoTiffSource {
    fn open(&self) -> Result<GeoRaster, RasterError> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| self.unreadable(e))?;

        let (width, height) = decoder.dimensions().map_err(|e| self.unreadable(e))?;
        let (width, height) = (width as usize, height as usize);
        let transform = read_transform(&mut decoder).map_err(|e| self.unreadable(e))?;
        let srid = read_srid(&mut decoder).map_err(|e| self.unreadable(e))?;
        let nodata = read_nodata(&mut decoder).map_err(|e| self.unreadable(e))?;

        let image = decoder.read_image().map_err(|e| self.unreadable(e))?;
        let (dtype, samples) = samples_of(image).ok_or_else(|| self.unreadable("unsupported sample format"))?;

        let pixels = width * height;
        if pixels == 0 || samples.len() % pixels != 0 {
            return Err(self.unreadable(format!(
                "decoded {} samples for a {}x{} image",
                samples.len(),
                width,
                height
            )));
        }
        let band_count = samples.len() / pixels;
        let nodata = nodata.filter(|v| dtype.fits(*v));

        let bands = (0..band_count)
            .map(|b| {
                let data = samples.iter().skip(b).step_by(band_count).copied().collect();
                Band::new(dtype, width, height, data, nodata)
            })
            .collect::<Result<Vec<_>, _>>()?;

        GeoRaster::new(
            width,
            height,
            transform,
            srid,
            bands,
            BackingStore::File(self.path.clone()),
        )
    }

    fn describe(&self) -> String {
        format!("geotiff {}", self.path.display())
    }
}

type TiffResult<T> = Result<T, tiff::TiffError>;

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> TiffResult<GeoTransform> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(GeoTransform {
                origin_x: m[3],
                origin_y: m[7],
                scale_x: m[0],
                scale_y: m[5],
                skew_x: m[1],
                skew_y: m[4],
            });
        }
    }

    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            let (sx, sy) = (scale[0], scale[1]);
            let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
            Ok(GeoTransform::north_up(x - i * sx, y + j * sy, sx, -sy))
        }
        // Ungeoreferenced: pixel space, rows growing downward.
        _ => Ok(GeoTransform::north_up(0.0, 0.0, 1.0, 1.0)),
    }
}

fn read_srid<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> TiffResult<u32> {
    let Some(value) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? else {
        return Ok(0);
    };
    let directory = value.into_u16_vec()?;
    Ok(srid_from_geokeys(&directory).unwrap_or(0))
}

/// Pull the EPSG code out of a GeoKey directory.
///
/// The directory is a header of four shorts followed by `(key, location,
/// count, value)` entries. Only inline values (location 0) carry a code.
fn srid_from_geokeys(directory: &[u16]) -> Option<u32> {
    let key_count = *directory.get(3)? as usize;
    let entries: Vec<&[u16]> = directory
        .get(4..)?
        .chunks_exact(4)
        .take(key_count)
        .collect();
    [PROJECTED_CRS_GEO_KEY, GEOGRAPHIC_CRS_GEO_KEY]
        .iter()
        .find_map(|wanted| {
            entries
                .iter()
                .find(|e| e[0] == *wanted && e[1] == 0 && e[3] != 0 && e[3] != 32767)
                .map(|e| e[3] as u32)
        })
}

fn read_nodata<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> TiffResult<Option<f64>> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    Ok(parse_nodata(&text))
}

fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn samples_of(image: DecodingResult) -> Option<(DataType, Vec<f64>)> {
    fn widen<T: Copy + Into<f64>>(v: Vec<T>) -> Vec<f64> {
        v.into_iter().map(Into::into).collect()
    }
    Some(match image {
        DecodingResult::U8(v) => (DataType::UInt8, widen(v)),
        DecodingResult::I8(v) => (DataType::Int8, widen(v)),
        DecodingResult::U16(v) => (DataType::UInt16, widen(v)),
        DecodingResult::I16(v) => (DataType::Int16, widen(v)),
        DecodingResult::U32(v) => (DataType::UInt32, widen(v)),
        DecodingResult::I32(v) => (DataType::Int32, widen(v)),
        DecodingResult::F32(v) => (DataType::Float32, widen(v)),
        DecodingResult::F64(v) => (DataType::Float64, v),
        _ => return None,
    })
}
