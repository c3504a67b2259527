//! Error types for protoflow-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Computed function not found: {0}")]
    UnknownFunction(String),

    #[error("Computed function {name} failed: {message}")]
    Computed { name: String, message: String },
}

impl Error {
    /// Shorthand for a type mismatch on a value
    pub fn type_error(expected: impl Into<String>, got: &crate::Value) -> Self {
        Error::TypeError {
            expected: expected.into(),
            got: got.type_name().to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
