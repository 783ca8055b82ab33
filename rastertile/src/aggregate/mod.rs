//! Histograms and summary statistics over tiles.
//!
//! Tiles are reduced in parallel: each tile produces its own [`Histogram`]
//! (or [`Moments`]) and the partial results are merged, so the outcome does
//! not depend on the order in which tiles are visited.

mod aggregator;
mod binning;
mod engine;
mod histogram;
mod stats;

pub use aggregator::{Aggregator, Grouping};
pub use binning::{Binning, Bucket};
pub use engine::{aggregate, aggregate_clipped, band_moments, count_band, AggregationEngine};
pub use histogram::Histogram;
pub use stats::{Moments, Statistics};

use thiserror::Error;

use crate::algebra::AlgebraError;
use crate::index::IndexError;
use crate::legend::LegendError;
use crate::raster::RasterError;
use crate::workers::WorkerPoolError;

/// Errors raised while aggregating.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Bucket width must be finite and positive, got {0}")]
    InvalidBucketWidth(f64),

    #[error("Unknown grouping '{0}': expected discrete, continuous or a legend document")]
    InvalidGrouping(String),

    #[error("A formula is required when aggregating {0} layers")]
    FormulaRequired(usize),

    #[error("Formula variable '{0}' is not bound to a layer")]
    UnboundVariable(String),

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Invalid legend: {0}")]
    Legend(#[from] LegendError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    WorkerPool(#[from] WorkerPoolError),
}
