//! Engine configuration.
//!
//! Settings are plain structs with defaults; an INI file can override any
//! subset of them:
//!
//! ```ini
//! [pyramid]
//! tile_size = 256
//! min_zoom = 0
//! zoom_policy = down
//! resampling = nearest
//! failure_policy = best_effort
//! workers = 0
//!
//! [aggregation]
//! bucket_width = 1.0
//! workers = 0
//!
//! [render]
//! background = #00000000
//! ```

mod parser;

use std::path::Path;

use ini::Ini;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::CoordError;
pub use crate::pyramid::PyramidConfig;
pub use crate::render::RenderConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid pyramid configuration: {0}")]
    Pyramid(#[from] CoordError),
}

/// Settings for value counts and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Interval width for continuous grouping.
    pub bucket_width: f64,
    /// Worker threads, `0` for one per core.
    pub workers: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bucket_width: 1.0,
            workers: 0,
        }
    }
}

impl AggregationConfig {
    pub fn with_bucket_width(mut self, width: f64) -> Self {
        self.bucket_width = width;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub pyramid: PyramidConfig,
    pub aggregation: AggregationConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    pub fn with_pyramid(mut self, pyramid: PyramidConfig) -> Self {
        self.pyramid = pyramid;
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Load from an INI file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parser::parse_ini(&ini)
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read(ini::Error::Parse(e)))?;
        parser::parse_ini(&ini)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pyramid.validate()?;
        let width = self.aggregation.bucket_width;
        if !(width.is_finite() && width > 0.0) {
            return Err(ConfigError::InvalidValue {
                section: "aggregation".to_string(),
                key: "bucket_width".to_string(),
                value: width.to_string(),
                reason: "must be a finite number greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
