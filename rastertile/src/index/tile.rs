//! Tiles and layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coord::{self, LayerId, TileCoord, TileKey, ZoomRange};
use crate::raster::{Band, DataType, Extent, GeoRaster, RasterError, Resampling};

/// One square, fixed-size tile of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    key: TileKey,
    raster: GeoRaster,
}

impl Tile {
    pub fn new(key: TileKey, raster: GeoRaster) -> Self {
        Self { key, raster }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn coord(&self) -> TileCoord {
        self.key.coord
    }

    pub fn layer(&self) -> LayerId {
        self.key.layer
    }

    pub fn raster(&self) -> &GeoRaster {
        &self.raster
    }

    pub fn into_raster(self) -> GeoRaster {
        self.raster
    }

    /// Tile edge length in pixels.
    pub fn size(&self) -> usize {
        self.raster.width()
    }

    /// First band, where tile data lives for single-band layers.
    pub fn band(&self) -> Result<&Band, RasterError> {
        self.raster.band(0)
    }

    /// Canonical footprint of the tile in the grid.
    pub fn bounds(&self) -> Extent {
        coord::tile_bounds(&self.key.coord)
    }
}

/// What a layer's values mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Class codes; never interpolated.
    #[default]
    Categorical,
    /// Measurements such as elevation or temperature.
    Continuous,
}

impl LayerKind {
    /// Resampling that keeps the values meaningful.
    pub fn default_resampling(self) -> Resampling {
        match self {
            LayerKind::Categorical => Resampling::Nearest,
            LayerKind::Continuous => Resampling::Bilinear,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Categorical => f.write_str("categorical"),
            LayerKind::Continuous => f.write_str("continuous"),
        }
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categorical" | "ca" => Ok(LayerKind::Categorical),
            "continuous" | "co" => Ok(LayerKind::Continuous),
            other => Err(format!("unknown layer kind '{}'", other)),
        }
    }
}

/// A raster registered as a tiled layer.
///
/// The source must be file based so the layer can always be rebuilt from it.
#[derive(Debug, Clone)]
pub struct RasterLayer {
    id: LayerId,
    name: String,
    kind: LayerKind,
    raster: GeoRaster,
}

impl RasterLayer {
    pub fn new(
        id: LayerId,
        name: impl Into<String>,
        kind: LayerKind,
        raster: GeoRaster,
    ) -> Result<Self, RasterError> {
        if !raster.backing().is_durable() {
            return Err(RasterError::InvalidBackingStore);
        }
        Ok(Self {
            id,
            name: name.into(),
            kind,
            raster,
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn raster(&self) -> &GeoRaster {
        &self.raster
    }
}

/// What the index knows about a layer besides its tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub tile_size: u32,
    /// Layer extent in the pyramid SRS.
    pub extent: Extent,
    pub dtype: DataType,
    pub band_count: usize,
    pub nodata: Option<f64>,
    /// Zoom levels built, `None` until a build has run.
    pub zoom_range: Option<ZoomRange>,
}
