//! Error types for predicate compilation.

use thiserror::Error;

/// Error during predicate compilation (AST to filter text).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CompileError {
    /// The error message, naming the offending construct.
    pub message: String,
    /// Error kind for programmatic handling.
    pub kind: CompileErrorKind,
}

/// Kinds of compilation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// A comparison referenced an empty field name.
    EmptyField,
    /// A float literal was NaN or infinite and has no grammar form.
    NonFiniteNumber,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, kind: CompileErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Create an empty-field error.
    pub fn empty_field(op: &str) -> Self {
        Self::new(
            format!("comparison '{op}' references an empty field name"),
            CompileErrorKind::EmptyField,
        )
    }

    /// Create a non-finite number error.
    pub fn non_finite(field: &str) -> Self {
        Self::new(
            format!("float literal for field '{field}' is not finite"),
            CompileErrorKind::NonFiniteNumber,
        )
    }
}
