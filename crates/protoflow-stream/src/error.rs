//! Error types for protoflow-stream

use thiserror::Error;

/// Stream and patch error type
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer does not (yet) hold valid JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The buffer parsed to a scalar instead of an object or array
    #[error("Not a document: parsed a {0}, expected an object or array")]
    NotADocument(&'static str),

    #[error("Invalid patch path: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Test failed at {path}")]
    TestFailed { path: String },

    #[error("Patch {op} at {path} requires a 'from' path")]
    MissingFrom { op: &'static str, path: String },

    #[error("Cannot remove the document root")]
    RootRemoval,
}

impl Error {
    /// Whether this error only means "wait for more chunks"
    pub fn is_incomplete(&self) -> bool {
        match self {
            Error::Parse(e) => e.is_eof(),
            Error::NotADocument(_) => true,
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
