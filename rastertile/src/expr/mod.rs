//! Expression engine shared by legends and raster algebra.
//!
//! Expressions are parsed once into an [`Expr`] tree and then evaluated
//! either per value or vectorised over whole bands.

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, Function, UnaryOp};
pub use error::ExpressionError;
pub use parser::parse;

/// Parse an expression that may only reference the variables in `allowed`.
pub fn parse_restricted(input: &str, allowed: &[&str]) -> Result<Expr, ExpressionError> {
    let expr = parse(input)?;
    if let Some(name) = expr.variables().into_iter().find(|v| !allowed.contains(v)) {
        return Err(ExpressionError::UnknownVariable {
            name: name.to_string(),
        });
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_restricted() {
        assert!(parse_restricted("x > 1", &["x"]).is_ok());
        assert_eq!(
            parse_restricted("y > 1", &["x"]),
            Err(ExpressionError::UnknownVariable { name: "y".into() })
        );
    }

    #[test]
    fn test_threshold_detection() {
        let expr = parse("x < 10").unwrap();
        assert_eq!(expr.as_threshold(), Some(("x", BinaryOp::Lt, 10.0)));
        let flipped = parse("10 <= x").unwrap();
        assert_eq!(flipped.as_threshold(), Some(("x", BinaryOp::Ge, 10.0)));
        let negative = parse("x > -5").unwrap();
        assert_eq!(negative.as_threshold(), Some(("x", BinaryOp::Gt, -5.0)));
        assert_eq!(parse("(x > 1) & (x < 2)").unwrap().as_threshold(), None);
        assert_eq!(parse("x + 1 > 2").unwrap().as_threshold(), None);
    }

    #[test]
    fn test_variables_and_literals() {
        let expr = parse("a + b * a").unwrap();
        assert_eq!(expr.variables().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(parse("-4").unwrap().as_literal(), Some(-4.0));
        assert_eq!(parse("x").unwrap().as_literal(), None);
        assert!(parse("x == 1").unwrap().is_boolean());
        assert!(!parse("x + 1").unwrap().is_boolean());
    }
}
