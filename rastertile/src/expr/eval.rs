//! Evaluation.
//!
//! Scalar evaluation serves per-pixel classification. Vector evaluation walks
//! the tree once and applies each node to whole arrays, broadcasting scalars.
//! Neither evaluator masks anything: invalid results come out as NaN or
//! infinities and callers decide what they mean.

use std::collections::BTreeMap;

use super::ast::{BinaryOp, Expr, Function, UnaryOp};

#[inline]
fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

#[inline]
fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[inline]
pub(crate) fn apply_unary(op: UnaryOp, v: f64) -> f64 {
    match op {
        UnaryOp::Neg => -v,
        UnaryOp::Not => {
            if v.is_nan() {
                f64::NAN
            } else {
                flag(v == 0.0)
            }
        }
    }
}

#[inline]
pub(crate) fn apply_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        // Floored modulo: the result takes the divisor's sign.
        BinaryOp::Rem => {
            if b == 0.0 {
                f64::NAN
            } else {
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    r + b
                } else {
                    r
                }
            }
        }
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Eq => flag(a == b),
        BinaryOp::Ne => flag(a != b),
        BinaryOp::Lt => flag(a < b),
        BinaryOp::Le => flag(a <= b),
        BinaryOp::Gt => flag(a > b),
        BinaryOp::Ge => flag(a >= b),
        BinaryOp::And => flag(truthy(a) && truthy(b)),
        BinaryOp::Or => flag(truthy(a) || truthy(b)),
    }
}

#[inline]
pub(crate) fn apply_function(function: Function, v: f64) -> f64 {
    match function {
        Function::Abs => v.abs(),
        Function::Sqrt => v.sqrt(),
        Function::Log => v.ln(),
        Function::Log10 => v.log10(),
        Function::Exp => v.exp(),
        Function::Floor => v.floor(),
        Function::Ceil => v.ceil(),
        Function::Round => v.round_ties_even(),
    }
}

impl Expr {
    /// Evaluate for one set of scalar variable values.
    ///
    /// Unbound variables evaluate to NaN.
    pub fn eval_scalar<F>(&self, lookup: &F) -> f64
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Literal(value) => *value,
            Expr::Variable(name) => lookup(name).unwrap_or(f64::NAN),
            Expr::Unary { op, operand } => apply_unary(*op, operand.eval_scalar(lookup)),
            Expr::Binary { op, left, right } => {
                apply_binary(*op, left.eval_scalar(lookup), right.eval_scalar(lookup))
            }
            Expr::Call { function, argument } => {
                apply_function(*function, argument.eval_scalar(lookup))
            }
        }
    }

    /// Evaluate with the single variable `x` bound to `value`.
    #[inline]
    pub fn eval_x(&self, value: f64) -> f64 {
        self.eval_scalar(&|name: &str| (name == "x").then_some(value))
    }

    /// Evaluate over arrays of `len` elements.
    ///
    /// Every binding must hold `len` values; unbound variables yield NaN.
    pub fn eval_arrays(&self, bindings: &BTreeMap<&str, &[f64]>, len: usize) -> Vec<f64> {
        match self.eval_node(bindings) {
            Values::Scalar(v) => vec![v; len],
            Values::Array(values) => values,
        }
    }

    fn eval_node(&self, bindings: &BTreeMap<&str, &[f64]>) -> Values {
        match self {
            Expr::Literal(value) => Values::Scalar(*value),
            Expr::Variable(name) => match bindings.get(name.as_str()) {
                Some(values) => Values::Array(values.to_vec()),
                None => Values::Scalar(f64::NAN),
            },
            Expr::Unary { op, operand } => operand.eval_node(bindings).map(|v| apply_unary(*op, v)),
            Expr::Call { function, argument } => argument
                .eval_node(bindings)
                .map(|v| apply_function(*function, v)),
            Expr::Binary { op, left, right } => {
                let op = *op;
                match (left.eval_node(bindings), right.eval_node(bindings)) {
                    (Values::Scalar(a), Values::Scalar(b)) => {
                        Values::Scalar(apply_binary(op, a, b))
                    }
                    (Values::Array(mut a), Values::Scalar(b)) => {
                        a.iter_mut().for_each(|v| *v = apply_binary(op, *v, b));
                        Values::Array(a)
                    }
                    (Values::Scalar(a), Values::Array(mut b)) => {
                        b.iter_mut().for_each(|v| *v = apply_binary(op, a, *v));
                        Values::Array(b)
                    }
                    (Values::Array(mut a), Values::Array(b)) => {
                        a.iter_mut()
                            .zip(b.iter())
                            .for_each(|(x, y)| *x = apply_binary(op, *x, *y));
                        Values::Array(a)
                    }
                }
            }
        }
    }
}

/// Intermediate result of a node: a broadcast scalar or a full array.
enum Values {
    Scalar(f64),
    Array(Vec<f64>),
}

impl Values {
    fn map(self, f: impl Fn(f64) -> f64) -> Values {
        match self {
            Values::Scalar(v) => Values::Scalar(f(v)),
            Values::Array(mut values) => {
                values.iter_mut().for_each(|v| *v = f(*v));
                Values::Array(values)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn eval(input: &str, x: f64) -> f64 {
        parse(input).unwrap().eval_x(x)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("x ** 2", 3.0), 9.0);
        assert_eq!(eval("-x ** 2", 3.0), -9.0);
        assert_eq!(eval("x / 4", 2.0), 0.5);
    }

    #[test]
    fn test_floored_modulo() {
        assert_eq!(eval("x % 3", 7.0), 1.0);
        assert_eq!(eval("x % 3", -7.0), 2.0);
        assert_eq!(eval("x % -3", 7.0), -2.0);
        assert!(eval("x % 0", 7.0).is_nan());
    }

    #[test]
    fn test_division_by_zero_is_not_finite() {
        assert!(eval("x / 0", 1.0).is_infinite());
        assert!(eval("x / 0", 0.0).is_nan());
    }

    #[test]
    fn test_logic() {
        assert_eq!(eval("(x >= 2) & (x < 5)", 2.0), 1.0);
        assert_eq!(eval("(x >= 2) & (x < 5)", 4.0), 1.0);
        assert_eq!(eval("(x >= 2) & (x < 5)", 5.0), 0.0);
        assert_eq!(eval("x < 0 | x > 10", 11.0), 1.0);
        assert_eq!(eval("!(x == 1)", 1.0), 0.0);
        assert_eq!(eval("not x", 0.0), 1.0);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("abs(x)", -2.5), 2.5);
        assert_eq!(eval("sqrt(x)", 16.0), 4.0);
        assert!(eval("sqrt(x)", -1.0).is_nan());
        assert_eq!(eval("log10(x)", 1000.0), 3.0);
        assert_eq!(eval("round(x)", 2.5), 2.0);
        assert_eq!(eval("round(x)", 3.5), 4.0);
        assert_eq!(eval("floor(x) + ceil(x)", 1.5), 3.0);
        assert!(eval("log(x)", 0.0).is_infinite());
    }

    #[test]
    fn test_arrays_broadcast_scalars() {
        let expr = parse("a * 2 + b").unwrap();
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0, 30.0];
        let bindings: BTreeMap<&str, &[f64]> = [("a", &a[..]), ("b", &b[..])].into_iter().collect();
        assert_eq!(expr.eval_arrays(&bindings, 3), vec![12.0, 24.0, 36.0]);

        let constant = parse("1 + 1").unwrap();
        assert_eq!(constant.eval_arrays(&bindings, 2), vec![2.0, 2.0]);
    }

    #[test]
    fn test_arrays_match_scalar_eval() {
        let expr = parse("(x > 1) & (x <= 3) | x == 7").unwrap();
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0, 7.0];
        let bindings: BTreeMap<&str, &[f64]> = [("x", &xs[..])].into_iter().collect();
        let vector = expr.eval_arrays(&bindings, xs.len());
        let scalar: Vec<f64> = xs.iter().map(|v| expr.eval_x(*v)).collect();
        assert_eq!(vector, scalar);
        assert_eq!(vector, vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    }
}
