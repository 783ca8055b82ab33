//! Rendering tiles to RGBA images and PNG bytes.
//!
//! A [`Renderer`] turns a band into an [`RgbaImage`] through a [`Style`].
//! Nodata and unclassified pixels take the background colour, which is
//! fully transparent unless configured otherwise. Encoding is separate so
//! callers that only need pixels never pay for compression.

mod style;

pub use style::{Gradient, Style};

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::Tile;
use crate::legend::{Legend, LegendError, Rgba};
use crate::raster::{Band, RasterError};

/// Errors raised while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot render a {width}x{height} image")]
    InvalidDimensions { width: usize, height: usize },

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Legend has no colour stops")]
    EmptyGradient,

    #[error(transparent)]
    Legend(#[from] LegendError),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Settings for [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Colour of nodata and unclassified pixels.
    pub background: Rgba,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: Rgba::TRANSPARENT,
        }
    }
}

/// Turns an RGBA image into file bytes.
pub trait TileEncoder: Send + Sync {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError>;

    /// File extension without the dot.
    fn extension(&self) -> &str;
}

/// Lossless PNG output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl TileEncoder for PngEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn extension(&self) -> &str {
        "png"
    }
}

/// Colours bands according to a [`Style`].
#[derive(Debug, Clone)]
pub struct Renderer {
    style: Style,
    config: RenderConfig,
}

impl Renderer {
    pub fn new(style: Style, config: RenderConfig) -> Self {
        Self { style, config }
    }

    /// Categorical rendering: first matching legend entry per pixel.
    pub fn legend(legend: Arc<Legend>) -> Self {
        Self::new(Style::Legend(legend), RenderConfig::default())
    }

    /// Continuous rendering through the legend's threshold colormap.
    pub fn gradient(legend: &Legend) -> Result<Self, RenderError> {
        let gradient = Gradient::from_legend(legend)?.ok_or(RenderError::EmptyGradient)?;
        Ok(Self::new(Style::Gradient(gradient), RenderConfig::default()))
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Raw RGBA bytes, row-major, four per pixel.
    pub fn rgba(&self, band: &Band) -> Vec<u8> {
        let background = self.config.background;
        band.data()
            .iter()
            .flat_map(|&value| {
                let color = if band.is_nodata(value) {
                    background
                } else {
                    self.style.color(value).unwrap_or(background)
                };
                color.to_array()
            })
            .collect()
    }

    pub fn render_band(&self, band: &Band) -> Result<RgbaImage, RenderError> {
        let (width, height) = (band.width(), band.height());
        let invalid = RenderError::InvalidDimensions { width, height };
        if width == 0 || height == 0 {
            return Err(invalid);
        }
        let w = u32::try_from(width).map_err(|_| RenderError::InvalidDimensions { width, height })?;
        let h = u32::try_from(height).map_err(|_| RenderError::InvalidDimensions { width, height })?;
        RgbaImage::from_raw(w, h, self.rgba(band)).ok_or(invalid)
    }

    /// Render the first band of a tile.
    pub fn render_tile(&self, tile: &Tile) -> Result<RgbaImage, RenderError> {
        self.render_band(tile.band()?)
    }

    /// Render and encode a tile.
    pub fn encode_tile(&self, tile: &Tile, encoder: &dyn TileEncoder) -> Result<Vec<u8>, RenderError> {
        encoder.encode(&self.render_tile(tile)?)
    }
}
