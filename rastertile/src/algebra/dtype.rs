//! Output type inference for algebra expressions.

use std::collections::BTreeMap;

use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::raster::DataType;

/// Type of an intermediate result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Kind {
    /// A constant that adapts to the array it meets.
    Weak { integral: bool },
    /// An array of a concrete type.
    Typed(DataType),
    /// A 0/1 array.
    Bool,
}

impl Kind {
    fn typed(self) -> Option<DataType> {
        match self {
            Kind::Weak { .. } => None,
            Kind::Typed(dtype) => Some(dtype),
            Kind::Bool => Some(DataType::UInt8),
        }
    }

    fn combine(left: Kind, right: Kind) -> Kind {
        match (left, right) {
            (Kind::Weak { integral: a }, Kind::Weak { integral: b }) => Kind::Weak {
                integral: a && b,
            },
            (Kind::Weak { integral }, other) | (other, Kind::Weak { integral }) => {
                let dtype = other.typed().unwrap_or(DataType::Float64);
                if integral || dtype.is_float() {
                    Kind::Typed(dtype)
                } else {
                    Kind::Typed(DataType::Float64)
                }
            }
            (a, b) => {
                let a = a.typed().unwrap_or(DataType::Float64);
                let b = b.typed().unwrap_or(DataType::Float64);
                Kind::Typed(a.promote(b))
            }
        }
    }

    fn float(self) -> Kind {
        match self {
            Kind::Weak { .. } => Kind::Weak { integral: false },
            other => Kind::Typed(other.typed().unwrap_or(DataType::Float64).to_float()),
        }
    }
}

/// Infer the type an expression produces given the types of its variables.
pub(crate) fn infer(expr: &Expr, types: &BTreeMap<&str, DataType>) -> Kind {
    match expr {
        Expr::Literal(value) => Kind::Weak {
            integral: value.fract() == 0.0,
        },
        Expr::Variable(name) => types
            .get(name.as_str())
            .map(|t| Kind::Typed(*t))
            .unwrap_or(Kind::Typed(DataType::Float64)),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => Kind::Bool,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match infer(operand, types) {
            Kind::Weak { integral } => Kind::Weak { integral },
            kind => {
                let dtype = kind.typed().unwrap_or(DataType::Float64);
                if dtype.is_signed() {
                    Kind::Typed(dtype)
                } else {
                    // Negating unsigned values needs a signed type.
                    Kind::Typed(dtype.promote(DataType::Int8))
                }
            }
        },
        Expr::Binary { op, left, right } => {
            if op.is_comparison() || op.is_logical() {
                return Kind::Bool;
            }
            let (l, r) = (infer(left, types), infer(right, types));
            match op {
                BinaryOp::Div => Kind::combine(l, r).float(),
                BinaryOp::Pow => {
                    let negative_exponent = right.as_literal().map_or(true, |e| e < 0.0);
                    let combined = Kind::combine(l, r);
                    if negative_exponent {
                        combined.float()
                    } else {
                        combined
                    }
                }
                _ => Kind::combine(l, r),
            }
        }
        Expr::Call { function, argument } => {
            let kind = infer(argument, types);
            if function.preserves_integers() {
                match kind {
                    Kind::Bool => Kind::Typed(DataType::UInt8),
                    other => other,
                }
            } else {
                kind.float()
            }
        }
    }
}
