//! Expression parse errors.

use thiserror::Error;

/// Why an expression could not be compiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("Invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },

    #[error("Unexpected '{found}' at position {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        position: usize,
    },

    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("Function '{name}' takes 1 argument, got {found}")]
    WrongArity { name: String, found: usize },

    /// A variable other than the ones the caller allows.
    #[error("Unknown variable '{name}'")]
    UnknownVariable { name: String },
}
