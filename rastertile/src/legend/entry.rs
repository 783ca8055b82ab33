//! Legend entries and their compiled matchers.

use serde::{Deserialize, Serialize};

use crate::expr::{self, Expr};

use super::{LegendError, Rgba};

/// A named category such as "Earth" or "Water".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendSemantics {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LegendSemantics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One row of a legend: a category, the expression selecting its values,
/// and the colour they are drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub semantics: LegendSemantics,
    pub expression: String,
    pub color: Rgba,
}

impl LegendEntry {
    pub fn new(semantics: LegendSemantics, expression: impl Into<String>, color: Rgba) -> Self {
        Self {
            semantics,
            expression: expression.into(),
            color,
        }
    }
}

/// How an entry decides whether a value belongs to it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Matcher {
    /// Exact equality with a numeric constant.
    Literal(f64),
    /// Boolean expression over `x`.
    Predicate(Expr),
}

impl Matcher {
    pub(crate) fn compile(expression: &str) -> Result<Self, LegendError> {
        let parsed = expr::parse_restricted(expression, &["x"]).map_err(|source| {
            LegendError::InvalidExpression {
                expression: expression.to_string(),
                source,
            }
        })?;
        Ok(match parsed.as_literal() {
            Some(value) => Matcher::Literal(value),
            None => Matcher::Predicate(parsed),
        })
    }

    #[inline]
    pub(crate) fn matches(&self, value: f64) -> bool {
        match self {
            Matcher::Literal(literal) => value == *literal,
            Matcher::Predicate(expr) => {
                let result = expr.eval_x(value);
                result != 0.0 && !result.is_nan()
            }
        }
    }
}
