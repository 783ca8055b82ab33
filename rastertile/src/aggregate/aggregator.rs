//! Value counts and statistics over one or more tiled layers.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use super::{AggregateError, AggregationEngine, Binning, Statistics};
use crate::algebra::RasterAlgebra;
use crate::coord::LayerId;
use crate::index::{Tile, TileIndex};
use crate::legend::Legend;
use crate::raster::Extent;

/// Grouping requested for a value count.
#[derive(Debug, Clone)]
pub enum Grouping {
    Discrete,
    Continuous,
    Legend(Arc<Legend>),
}

impl Grouping {
    /// Parse `discrete`/`categorical`, `continuous`, or a legend JSON document.
    pub fn parse(text: &str) -> Result<Self, AggregateError> {
        let trimmed = text.trim();
        match trimmed.to_lowercase().as_str() {
            "discrete" | "categorical" => Ok(Grouping::Discrete),
            "continuous" => Ok(Grouping::Continuous),
            _ if trimmed.starts_with('{') => {
                Ok(Grouping::Legend(Arc::new(Legend::from_json(trimmed)?)))
            }
            _ => Err(AggregateError::InvalidGrouping(text.to_string())),
        }
    }

    fn binning(&self, bucket_width: f64) -> Result<Binning, AggregateError> {
        match self {
            Grouping::Discrete => Ok(Binning::Categorical),
            Grouping::Continuous => Binning::continuous(bucket_width),
            Grouping::Legend(legend) => Ok(Binning::Legend(Arc::clone(legend))),
        }
    }
}

/// A formula over named layers, evaluated tile by tile and aggregated.
///
/// Tiles are matched by position across layers; a position missing from any
/// layer is skipped, so a layer without tiles yields an empty result.
#[derive(Debug, Clone)]
pub struct Aggregator {
    layers: BTreeMap<String, LayerId>,
    algebra: RasterAlgebra,
    zoom: Option<u8>,
    grouping: Grouping,
    bucket_width: f64,
    clip: Option<Extent>,
}

impl Aggregator {
    /// Aggregator for `formula` over `layers`.
    ///
    /// A missing formula defaults to the single layer's variable name.
    pub fn new(
        layers: BTreeMap<String, LayerId>,
        formula: Option<&str>,
    ) -> Result<Self, AggregateError> {
        let formula = match formula {
            Some(formula) => formula.to_string(),
            None if layers.len() == 1 => layers.keys().next().cloned().unwrap_or_default(),
            None => return Err(AggregateError::FormulaRequired(layers.len())),
        };
        let algebra = RasterAlgebra::parse(&formula)?;
        if let Some(missing) = algebra.variables().into_iter().find(|v| !layers.contains_key(*v)) {
            return Err(AggregateError::UnboundVariable(missing.to_string()));
        }
        Ok(Self {
            layers,
            algebra,
            zoom: None,
            grouping: Grouping::Discrete,
            bucket_width: 1.0,
            clip: None,
        })
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_bucket_width(mut self, width: f64) -> Self {
        self.bucket_width = width;
        self
    }

    /// Only count pixels whose centre lies in `extent` (pyramid SRS).
    pub fn with_clip(mut self, extent: Extent) -> Self {
        self.clip = Some(extent);
        self
    }

    pub fn formula(&self) -> &str {
        self.algebra.formula()
    }

    /// Zoom to aggregate at: the explicit one, else the smallest maximum
    /// zoom among the layers. `None` if some layer has never been built.
    pub fn resolve_zoom(&self, index: &TileIndex) -> Result<Option<u8>, AggregateError> {
        if let Some(zoom) = self.zoom {
            return Ok(Some(zoom));
        }
        let mut zoom: Option<u8> = None;
        for layer in self.layers.values() {
            match index.zoom_range(*layer)? {
                Some(range) => zoom = Some(zoom.map_or(range.max, |z| z.min(range.max))),
                None => return Ok(None),
            }
        }
        Ok(zoom)
    }

    /// Evaluate the formula on every tile position present in all layers.
    pub fn derived_tiles(&self, index: &TileIndex) -> Result<Vec<Arc<Tile>>, AggregateError> {
        let Some(zoom) = self.resolve_zoom(index)? else {
            return Ok(Vec::new());
        };
        let Some((_, first)) = self.layers.iter().next() else {
            return Err(AggregateError::FormulaRequired(0));
        };

        let positions: Vec<_> = index.list(*first, zoom)?.coords().to_vec();
        let derived = positions
            .par_iter()
            .filter_map(|coord| {
                let mut bindings = BTreeMap::new();
                for (name, layer) in &self.layers {
                    let tile = index.lookup(*layer, *coord).ok()?;
                    bindings.insert(name.clone(), tile);
                }
                Some(bindings)
            })
            .map(|bindings| -> Result<Arc<Tile>, AggregateError> {
                Ok(Arc::new(self.algebra.evaluate_tiles(&bindings)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            formula = self.algebra.formula(),
            zoom,
            positions = positions.len(),
            matched = derived.len(),
            "Evaluated aggregation tiles"
        );
        Ok(derived)
    }

    /// Pixel counts (or areas in squared SRS units) keyed by bucket label.
    pub fn value_count(
        &self,
        index: &TileIndex,
        engine: &AggregationEngine,
        area: bool,
    ) -> Result<BTreeMap<String, f64>, AggregateError> {
        let binning = self.grouping.binning(self.bucket_width)?;
        let tiles = self.derived_tiles(index)?;
        let Some(first) = tiles.first() else {
            return Ok(BTreeMap::new());
        };
        let unit = if area {
            first.raster().transform().pixel_area()
        } else {
            1.0
        };
        let histogram = engine.aggregate(&tiles, &binning, self.clip.as_ref())?;
        Ok(histogram.labelled(&binning, unit))
    }

    /// Min, max, mean and standard deviation of the formula's valid values.
    pub fn statistics(
        &self,
        index: &TileIndex,
        engine: &AggregationEngine,
    ) -> Result<Option<Statistics>, AggregateError> {
        let tiles = self.derived_tiles(index)?;
        engine.statistics(&tiles, self.clip.as_ref())
    }
}
