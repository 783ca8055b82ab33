//! rastertile - raster tile pyramids with classification and aggregation
//!
//! This library cuts a georeferenced raster into a TMS tile pyramid and
//! serves derived products from the tiles: legend-coloured renderings,
//! band algebra across layers, and value counts and statistics with nodata
//! masking.
//!
//! Data flows from a [`raster::RasterSource`] through the
//! [`pyramid::PyramidBuilder`] into the [`index::TileIndex`]; rendering,
//! algebra and aggregation read tiles back out of the index.

pub mod aggregate;
pub mod algebra;
pub mod config;
pub mod coord;
pub mod expr;
pub mod index;
pub mod legend;
pub mod logging;
pub mod pyramid;
pub mod raster;
pub mod render;
pub mod service;
pub mod workers;
