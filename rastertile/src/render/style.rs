//! Value → colour mappings used by the renderer.

use std::sync::Arc;

use crate::legend::{Classification, Legend, LegendError, Rgba};

/// Piecewise-linear colour ramp over ascending stops.
///
/// Values below the first stop take its colour, values above the last stop
/// take the last colour.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<(f64, Rgba)>,
}

impl Gradient {
    /// Ramp over `stops`, sorted by bound. Returns `None` without stops.
    pub fn new(mut stops: Vec<(f64, Rgba)>) -> Option<Self> {
        if stops.is_empty() {
            return None;
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(Self { stops })
    }

    /// Ramp through the thresholds of a legend.
    pub fn from_legend(legend: &Legend) -> Result<Option<Self>, LegendError> {
        Ok(Self::new(legend.colormap()?))
    }

    pub fn stops(&self) -> &[(f64, Rgba)] {
        &self.stops
    }

    pub fn color(&self, value: f64) -> Rgba {
        let upper = self.stops.partition_point(|(bound, _)| *bound <= value);
        match upper {
            0 => self.stops[0].1,
            n if n == self.stops.len() => self.stops[n - 1].1,
            n => {
                let (lo, lo_color) = self.stops[n - 1];
                let (hi, hi_color) = self.stops[n];
                lo_color.lerp(&hi_color, (value - lo) / (hi - lo))
            }
        }
    }
}

/// How pixel values become colours.
#[derive(Debug, Clone)]
pub enum Style {
    /// First matching legend entry; unmatched values use the background.
    Legend(Arc<Legend>),
    /// Continuous ramp.
    Gradient(Gradient),
}

impl Style {
    /// Colour of a valid (non-nodata) value, `None` when unclassified.
    pub fn color(&self, value: f64) -> Option<Rgba> {
        match self {
            Style::Legend(legend) => match legend.classify(value) {
                Classification::Color(color) => Some(color),
                Classification::Unclassified => None,
            },
            Style::Gradient(_) if value.is_nan() => None,
            Style::Gradient(gradient) => Some(gradient.color(value)),
        }
    }
}
