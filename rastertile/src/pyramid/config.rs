//! Pyramid build settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coord::{validate_tile_size, CoordError, DEFAULT_TILE_SIZE, MAX_ZOOM, MIN_ZOOM};
use crate::index::LayerKind;
use crate::raster::Resampling;

/// How the deepest zoom level is chosen from the source pixel size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomPolicy {
    /// Deepest zoom whose pixels are no smaller than the source pixels.
    #[default]
    Down,
    /// Shallowest zoom whose pixels are no larger than the source pixels.
    Up,
}

impl fmt::Display for ZoomPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomPolicy::Down => f.write_str("down"),
            ZoomPolicy::Up => f.write_str("up"),
        }
    }
}

impl FromStr for ZoomPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "down" => Ok(ZoomPolicy::Down),
            "up" | "native" => Ok(ZoomPolicy::Up),
            other => Err(format!("unknown zoom policy '{}'", other)),
        }
    }
}

/// What a build does when a single tile fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Skip the tile, record it in the report, keep going.
    #[default]
    BestEffort,
    /// Stage all tiles and write none unless every tile succeeded.
    AllOrNothing,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::BestEffort => f.write_str("best_effort"),
            FailurePolicy::AllOrNothing => f.write_str("all_or_nothing"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(FailurePolicy::BestEffort),
            "all_or_nothing" | "atomic" => Ok(FailurePolicy::AllOrNothing),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Settings for [`super::PyramidBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidConfig {
    /// Tile edge in pixels, a power of two.
    pub tile_size: u32,
    /// Shallowest zoom to build; clamped to the computed maximum.
    pub min_zoom: u8,
    pub zoom_policy: ZoomPolicy,
    /// Resampling for every layer; `None` uses the layer kind's default.
    pub resampling: Option<Resampling>,
    pub failure_policy: FailurePolicy,
    /// Worker threads, `0` for one per core.
    pub workers: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            min_zoom: MIN_ZOOM,
            zoom_policy: ZoomPolicy::default(),
            resampling: None,
            failure_policy: FailurePolicy::default(),
            workers: 0,
        }
    }
}

impl PyramidConfig {
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_min_zoom(mut self, min_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    pub fn with_zoom_policy(mut self, policy: ZoomPolicy) -> Self {
        self.zoom_policy = policy;
        self
    }

    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = Some(resampling);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Resampling used for a layer of the given kind.
    pub fn resampling_for(&self, kind: LayerKind) -> Resampling {
        self.resampling.unwrap_or_else(|| kind.default_resampling())
    }

    pub fn validate(&self) -> Result<(), CoordError> {
        validate_tile_size(self.tile_size)?;
        if self.min_zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(self.min_zoom));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PyramidConfig::default();
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.min_zoom, 0);
        assert_eq!(config.zoom_policy, ZoomPolicy::Down);
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resampling_follows_layer_kind() {
        let config = PyramidConfig::default();
        assert_eq!(config.resampling_for(LayerKind::Categorical), Resampling::Nearest);
        assert_eq!(config.resampling_for(LayerKind::Continuous), Resampling::Bilinear);

        let config = config.with_resampling(Resampling::Majority);
        assert_eq!(config.resampling_for(LayerKind::Continuous), Resampling::Majority);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PyramidConfig::default().with_tile_size(300).validate().is_err());
        assert!(PyramidConfig::default().with_min_zoom(23).validate().is_err());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("UP".parse::<ZoomPolicy>(), Ok(ZoomPolicy::Up));
        assert_eq!("down".parse::<ZoomPolicy>(), Ok(ZoomPolicy::Down));
        assert!("sideways".parse::<ZoomPolicy>().is_err());
        assert_eq!(
            "all-or-nothing".parse::<FailurePolicy>(),
            Ok(FailurePolicy::AllOrNothing)
        );
        assert_eq!(FailurePolicy::BestEffort.to_string(), "best_effort");
    }
}
