//! Raster algebra
//!
//! Evaluates an arithmetic/boolean formula over named bands, e.g.
//! `(a - b) / (a + b)` or `(a > 100) & (b == 3)`. The formula is parsed once
//! and evaluated node by node over whole arrays. A pixel is nodata in the
//! output when it is nodata in any referenced input or when the formula has
//! no finite value there (division by zero, `sqrt` of a negative...).

mod dtype;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::expr::{self, Expr, ExpressionError};
use crate::index::Tile;
use crate::raster::{BackingStore, Band, DataType, GeoRaster, RasterError};
use dtype::{infer, Kind};

#[derive(Debug, Error)]
pub enum AlgebraError {
    #[error("Invalid formula: {0}")]
    InvalidExpression(#[from] ExpressionError),

    #[error("Variable '{0}' is not bound to a band")]
    UnboundVariable(String),

    #[error("No bands bound to the formula")]
    NoBindings,

    #[error("Binding '{variable}' does not match the others: {detail}")]
    ShapeMismatch { variable: String, detail: String },

    #[error("Output nodata {nodata} collides with {reason}")]
    NodataConflict { nodata: f64, reason: String },

    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// A compiled algebra formula.
#[derive(Debug, Clone)]
pub struct RasterAlgebra {
    formula: String,
    expr: Expr,
    nodata: Option<f64>,
}

impl RasterAlgebra {
    pub fn parse(formula: &str) -> Result<Self, AlgebraError> {
        Ok(Self {
            formula: formula.to_string(),
            expr: expr::parse(formula)?,
            nodata: None,
        })
    }

    /// Use an explicit output nodata instead of inheriting one.
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Variables the formula references, sorted.
    pub fn variables(&self) -> Vec<&str> {
        self.expr.variables().into_iter().collect()
    }

    /// Evaluate over bands of identical shape.
    pub fn evaluate(&self, bindings: &BTreeMap<String, &Band>) -> Result<Band, AlgebraError> {
        let (first_name, first) = bindings.iter().next().ok_or(AlgebraError::NoBindings)?;
        let (width, height) = (first.width(), first.height());
        for (name, band) in bindings {
            if band.width() != width || band.height() != height {
                return Err(AlgebraError::ShapeMismatch {
                    variable: name.clone(),
                    detail: format!(
                        "{}x{} pixels, '{}' has {}x{}",
                        band.width(),
                        band.height(),
                        first_name,
                        width,
                        height
                    ),
                });
            }
        }

        let mut inputs: BTreeMap<&str, &Band> = BTreeMap::new();
        for name in self.expr.variables() {
            let band = *bindings
                .get(name)
                .ok_or_else(|| AlgebraError::UnboundVariable(name.to_string()))?;
            inputs.insert(name, band);
        }

        let types: BTreeMap<&str, DataType> =
            inputs.iter().map(|(name, band)| (*name, band.dtype())).collect();
        let kind = infer(&self.expr, &types);

        let inherited = inputs.values().find_map(|band| band.nodata());
        let (dtype, nodata) = output_type(kind, self.nodata.or(inherited))?;

        let len = width * height;
        let arrays: BTreeMap<&str, &[f64]> =
            inputs.iter().map(|(name, band)| (*name, band.data())).collect();
        let mut values = self.expr.eval_arrays(&arrays, len);
        let valid: Vec<bool> = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                value.is_finite() && !inputs.values().any(|band| band.is_nodata(band.data()[i]))
            })
            .collect();

        let results = values.iter().zip(&valid).filter(|(_, ok)| **ok).map(|(v, _)| *v);
        let dtype = widen_to_fit(dtype, nodata, results);

        for (i, value) in values.iter_mut().enumerate() {
            if !valid[i] {
                *value = nodata;
                continue;
            }
            *value = dtype.cast(*value);
            if *value == nodata {
                return Err(AlgebraError::NodataConflict {
                    nodata,
                    reason: format!("a valid result at pixel {}", i),
                });
            }
        }

        Ok(Band::new(dtype, width, height, values, Some(nodata))?)
    }

    /// Evaluate over co-located tiles.
    ///
    /// The result takes the georeferencing and key of the first binding and
    /// is never stored in the index.
    pub fn evaluate_tiles(
        &self,
        bindings: &BTreeMap<String, Arc<Tile>>,
    ) -> Result<Tile, AlgebraError> {
        let (first_name, first) = bindings.iter().next().ok_or(AlgebraError::NoBindings)?;
        for (name, tile) in bindings {
            if tile.coord() != first.coord() {
                return Err(AlgebraError::ShapeMismatch {
                    variable: name.clone(),
                    detail: format!("tile {}, '{}' is tile {}", tile.coord(), first_name, first.coord()),
                });
            }
        }

        let bands = bindings
            .iter()
            .map(|(name, tile)| -> Result<(String, &Band), RasterError> {
                Ok((name.clone(), tile.band()?))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let band = self.evaluate(&bands)?;

        let raster = first.raster();
        let raster = GeoRaster::new(
            raster.width(),
            raster.height(),
            *raster.transform(),
            raster.srid(),
            vec![band],
            BackingStore::Memory,
        )?;
        Ok(Tile::new(first.key(), raster))
    }
}

/// Smallest type in `dtype, Int16, Int32, Float64` that holds every valid
/// result and the nodata value exactly.
///
/// Integer arithmetic can leave the inferred type (`200u8 + 100u8`,
/// `1u8 - 2u8`); those results move to a wider type instead of saturating.
fn widen_to_fit(dtype: DataType, nodata: f64, results: impl Iterator<Item = f64>) -> DataType {
    if dtype.is_float() {
        return dtype;
    }
    let (mut min, mut max, mut integral) = (f64::INFINITY, f64::NEG_INFINITY, true);
    for value in results {
        min = min.min(value);
        max = max.max(value);
        integral &= value.fract() == 0.0;
    }
    if !integral {
        return DataType::Float64;
    }
    if min > max {
        return dtype;
    }
    let holds = |candidate: DataType| {
        candidate.fits(min) && candidate.fits(max) && candidate.fits(nodata)
    };
    [dtype, DataType::Int16, DataType::Int32]
        .into_iter()
        .find(|candidate| holds(*candidate))
        .unwrap_or(DataType::Float64)
}

/// Output type and nodata for an expression of the given kind.
fn output_type(kind: Kind, nodata: Option<f64>) -> Result<(DataType, f64), AlgebraError> {
    match kind {
        Kind::Bool => {
            let nodata = nodata.unwrap_or(DataType::UInt8.default_nodata());
            if nodata == 0.0 || nodata == 1.0 {
                return Err(AlgebraError::NodataConflict {
                    nodata,
                    reason: "the boolean values 0 and 1".to_string(),
                });
            }
            Ok((DataType::boolean_for(nodata), nodata))
        }
        Kind::Typed(dtype) => {
            let nodata = nodata.unwrap_or(dtype.default_nodata());
            let dtype = if dtype.fits(nodata) || (nodata.is_nan() && dtype.is_float()) {
                dtype
            } else {
                DataType::Float64
            };
            Ok((dtype, nodata))
        }
        Kind::Weak { .. } => {
            let dtype = DataType::Float64;
            Ok((dtype, nodata.unwrap_or(dtype.default_nodata())))
        }
    }
}
