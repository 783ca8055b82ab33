//! Legend classification
//!
//! A legend maps pixel values to colours through an ordered list of entries.
//! Each entry is either a numeric literal, matched exactly, or a boolean
//! expression over the implicit variable `x`. Entries are tried in ascending
//! rank code and the first match wins.

mod color;
mod entry;

pub use color::Rgba;
pub use entry::{LegendEntry, LegendSemantics};

use entry::Matcher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::{BinaryOp, ExpressionError};
use crate::raster::Band;

/// Errors raised while building or using a legend.
#[derive(Debug, Error)]
pub enum LegendError {
    #[error("Invalid legend expression '{expression}': {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: ExpressionError,
    },

    #[error("Invalid colour '{0}' (expected #RRGGBB or #RRGGBBAA)")]
    InvalidColor(String),

    #[error("Legend cannot be turned into a colormap: '{expression}' is not a threshold on x")]
    NotColormappable { expression: String },

    #[error("Invalid legend document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of classifying one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Color(Rgba),
    Unclassified,
}

impl Classification {
    /// Pixel colour, transparent when unclassified.
    #[inline]
    pub fn rgba(self) -> Rgba {
        match self {
            Classification::Color(color) => color,
            Classification::Unclassified => Rgba::TRANSPARENT,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    entry: LegendEntry,
    code: u32,
    matcher: Matcher,
}

/// An ordered, compiled legend.
#[derive(Debug, Clone)]
pub struct Legend {
    title: String,
    entries: Vec<CompiledEntry>,
}

impl Legend {
    /// Compile every entry expression and order entries by rank code.
    ///
    /// Entries sharing a code keep their given order.
    pub fn new(
        title: impl Into<String>,
        entries: impl IntoIterator<Item = (LegendEntry, u32)>,
    ) -> Result<Self, LegendError> {
        let mut compiled = entries
            .into_iter()
            .map(|(entry, code)| -> Result<CompiledEntry, LegendError> {
                let matcher = Matcher::compile(&entry.expression)?;
                Ok(CompiledEntry {
                    entry,
                    code,
                    matcher,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        compiled.sort_by_key(|c| c.code);
        Ok(Self {
            title: title.into(),
            entries: compiled,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rank order with their codes.
    pub fn entries(&self) -> impl Iterator<Item = (&LegendEntry, u32)> {
        self.entries.iter().map(|c| (&c.entry, c.code))
    }

    /// Rank position of the first entry matching `value`.
    #[inline]
    pub fn match_index(&self, value: f64) -> Option<usize> {
        self.entries.iter().position(|c| c.matcher.matches(value))
    }

    /// Entry at a rank position.
    pub fn entry(&self, index: usize) -> Option<&LegendEntry> {
        self.entries.get(index).map(|c| &c.entry)
    }

    pub fn classify(&self, value: f64) -> Classification {
        match self.match_index(value) {
            Some(index) => Classification::Color(self.entries[index].entry.color),
            None => Classification::Unclassified,
        }
    }

    /// Classify every pixel of a band; nodata is always unclassified.
    pub fn classify_band(&self, band: &Band) -> Vec<Classification> {
        band.data()
            .iter()
            .map(|&v| {
                if band.is_nodata(v) {
                    Classification::Unclassified
                } else {
                    self.classify(v)
                }
            })
            .collect()
    }

    /// Threshold colormap: `(bound, colour)` pairs sorted by bound.
    ///
    /// Available only when every entry is a literal or a single comparison
    /// between `x` and a constant. A bound claimed by several entries keeps
    /// the highest-ranked one.
    pub fn colormap(&self) -> Result<Vec<(f64, Rgba)>, LegendError> {
        let mut stops: Vec<(f64, Rgba)> = Vec::with_capacity(self.entries.len());
        for compiled in &self.entries {
            let bound = match &compiled.matcher {
                Matcher::Literal(value) => Some(*value),
                Matcher::Predicate(expr) => expr
                    .as_threshold()
                    .filter(|(_, op, _)| *op != BinaryOp::Ne)
                    .map(|(_, _, value)| value),
            };
            let bound = bound.filter(|b| b.is_finite()).ok_or_else(|| {
                LegendError::NotColormappable {
                    expression: compiled.entry.expression.clone(),
                }
            })?;
            if !stops.iter().any(|(b, _)| *b == bound) {
                stops.push((bound, compiled.entry.color));
            }
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(stops)
    }

    pub fn from_json(text: &str) -> Result<Self, LegendError> {
        let document: LegendDocument = serde_json::from_str(text)?;
        Legend::try_from(document)
    }

    pub fn to_json(&self) -> Result<String, LegendError> {
        Ok(serde_json::to_string_pretty(&LegendDocument::from(self))?)
    }
}

/// Serialized legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendDocument {
    #[serde(default)]
    pub title: String,
    pub entries: Vec<EntryDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub expression: String,
    pub color: Rgba,
    #[serde(default)]
    pub code: u32,
}

impl TryFrom<LegendDocument> for Legend {
    type Error = LegendError;

    fn try_from(document: LegendDocument) -> Result<Self, Self::Error> {
        let entries = document.entries.into_iter().map(|e| {
            let semantics = LegendSemantics {
                name: e.name,
                description: e.description,
            };
            (LegendEntry::new(semantics, e.expression, e.color), e.code)
        });
        Legend::new(document.title, entries)
    }
}

impl From<&Legend> for LegendDocument {
    fn from(legend: &Legend) -> Self {
        LegendDocument {
            title: legend.title.clone(),
            entries: legend
                .entries()
                .map(|(entry, code)| EntryDocument {
                    name: entry.semantics.name.clone(),
                    description: entry.semantics.description.clone(),
                    expression: entry.expression.clone(),
                    color: entry.color,
                    code,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::DataType;
    use proptest::prelude::*;

    fn entry(name: &str, expression: &str, color: &str) -> LegendEntry {
        LegendEntry::new(
            LegendSemantics::new(name),
            expression,
            Rgba::from_hex(color).unwrap(),
        )
    }

    fn discrete() -> Legend {
        Legend::new(
            "Landcover",
            vec![
                (entry("Earth", "4", "#123456"), 1),
                (entry("Water", "10", "#654321"), 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_literal_entries() {
        let legend = discrete();
        assert_eq!(
            legend.classify(4.0),
            Classification::Color(Rgba::opaque(0x12, 0x34, 0x56))
        );
        assert_eq!(
            legend.classify(10.0),
            Classification::Color(Rgba::opaque(0x65, 0x43, 0x21))
        );
        assert_eq!(legend.classify(7.0), Classification::Unclassified);
        assert_eq!(legend.classify(7.0).rgba(), Rgba::TRANSPARENT);
    }

    #[test]
    fn test_range_expression() {
        let legend = Legend::new(
            "Range",
            vec![(entry("Mid", "(x >= 2) & (x < 5)", "#123456"), 0)],
        )
        .unwrap();
        for v in [2.0, 3.0, 4.0, 4.99] {
            assert!(matches!(legend.classify(v), Classification::Color(_)), "{}", v);
        }
        assert_eq!(legend.classify(5.0), Classification::Unclassified);
        assert_eq!(legend.classify(1.99), Classification::Unclassified);
    }

    #[test]
    fn test_first_match_by_code() {
        // Listed out of order: code 1 must win over code 5.
        let legend = Legend::new(
            "Overlap",
            vec![
                (entry("Wide", "x > 0", "#ff0000"), 5),
                (entry("Narrow", "x > 3", "#00ff00"), 1),
            ],
        )
        .unwrap();
        assert_eq!(legend.classify(4.0), Classification::Color(Rgba::opaque(0, 255, 0)));
        assert_eq!(legend.classify(1.0), Classification::Color(Rgba::opaque(255, 0, 0)));
        let names: Vec<&str> = legend.entries().map(|(e, _)| e.semantics.name.as_str()).collect();
        assert_eq!(names, vec!["Narrow", "Wide"]);
    }

    #[test]
    fn test_equal_codes_keep_order() {
        let legend = Legend::new(
            "Ties",
            vec![
                (entry("A", "x > 0", "#ff0000"), 0),
                (entry("B", "x > 0", "#00ff00"), 0),
            ],
        )
        .unwrap();
        assert_eq!(legend.classify(1.0), Classification::Color(Rgba::opaque(255, 0, 0)));
    }

    #[test]
    fn test_invalid_expression_rejected_at_load() {
        let result = Legend::new("Bad", vec![(entry("Bad", "x >> 2", "#000000"), 0)]);
        assert!(matches!(result, Err(LegendError::InvalidExpression { .. })));
        let result = Legend::new("Bad", vec![(entry("Bad", "z > 2", "#000000"), 0)]);
        assert!(matches!(result, Err(LegendError::InvalidExpression { .. })));
    }

    #[test]
    fn test_classify_band_masks_nodata() {
        let band = Band::new(DataType::UInt8, 3, 1, vec![4.0, 10.0, 4.0], Some(4.0)).unwrap();
        let classes = discrete().classify_band(&band);
        assert_eq!(classes[0], Classification::Unclassified);
        assert!(matches!(classes[1], Classification::Color(_)));
        assert_eq!(classes[2], Classification::Unclassified);
    }

    #[test]
    fn test_colormap() {
        let legend = Legend::new(
            "Elevation",
            vec![
                (entry("High", "x >= 1000", "#ffffff"), 2),
                (entry("Low", "x < 10", "#000000"), 0),
                (entry("Mid", "500 <= x", "#808080"), 1),
            ],
        )
        .unwrap();
        let stops = legend.colormap().unwrap();
        let bounds: Vec<f64> = stops.iter().map(|(b, _)| *b).collect();
        assert_eq!(bounds, vec![10.0, 500.0, 1000.0]);
        assert_eq!(stops[0].1, Rgba::opaque(0, 0, 0));
    }

    #[test]
    fn test_colormap_rejects_compound_expressions() {
        let legend = Legend::new(
            "Range",
            vec![(entry("Mid", "(x >= 2) & (x < 5)", "#123456"), 0)],
        )
        .unwrap();
        match legend.colormap() {
            Err(LegendError::NotColormappable { expression }) => {
                assert_eq!(expression, "(x >= 2) & (x < 5)")
            }
            other => panic!("expected NotColormappable, got {:?}", other),
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let text = r##"{
            "title": "Landcover",
            "entries": [
                {"name": "Water", "expression": "10", "color": "#654321", "code": 2},
                {"name": "Earth", "description": "Bare soil", "expression": "4", "color": "#123456", "code": 1}
            ]
        }"##;
        let legend = Legend::from_json(text).unwrap();
        assert_eq!(legend.title(), "Landcover");
        assert_eq!(legend.entry(0).unwrap().semantics.name, "Earth");
        assert_eq!(
            legend.entry(0).unwrap().semantics.description.as_deref(),
            Some("Bare soil")
        );

        let again = Legend::from_json(&legend.to_json().unwrap()).unwrap();
        assert_eq!(
            LegendDocument::from(&again),
            LegendDocument::from(&legend)
        );
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(Legend::from_json("{"), Err(LegendError::Json(_))));
        let bad_color = r#"{"title": "t", "entries": [{"name": "a", "expression": "1", "color": "red"}]}"#;
        assert!(matches!(Legend::from_json(bad_color), Err(LegendError::Json(_))));
    }

    fn overlapping_entries() -> Vec<LegendEntry> {
        vec![
            entry("Positive", "x > 0", "#ff0000"),
            entry("High", "x > 3", "#00ff00"),
            entry("Two", "2", "#0000ff"),
            entry("Teens", "(x >= 10) & (x < 20)", "#ffffff"),
            entry("Minus one", "-1", "#000000"),
        ]
    }

    proptest! {
        #[test]
        fn test_code_order_only_decides_ambiguous_values(
            codes_a in prop::collection::vec(0u32..10, 5),
            codes_b in prop::collection::vec(0u32..10, 5),
            halves in -10i32..50
        ) {
            let value = halves as f64 / 2.0;
            let entries = overlapping_entries();
            let matching = entries
                .iter()
                .filter(|e| {
                    let single = Legend::new("single", vec![((*e).clone(), 0)]).unwrap();
                    single.classify(value) != Classification::Unclassified
                })
                .count();

            let a = Legend::new("a", entries.iter().cloned().zip(codes_a)).unwrap();
            let b = Legend::new("b", entries.iter().cloned().zip(codes_b)).unwrap();
            if matching <= 1 {
                prop_assert_eq!(a.classify(value), b.classify(value));
            }
            if matching == 0 {
                prop_assert_eq!(a.classify(value), Classification::Unclassified);
            }
        }
    }
}
