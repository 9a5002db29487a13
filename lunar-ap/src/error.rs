//! Error types for lunar-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Media-level failures live in [`crate::media::MediaError`]; they are classified
//! and reported by the reconciler and never reach callers as `Error`.

use thiserror::Error;

/// Main error type for lunar-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Upload/import collaborator errors
    #[error("Import error: {0}")]
    Import(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<lunar_common::Error> for Error {
    fn from(e: lunar_common::Error) -> Self {
        match e {
            lunar_common::Error::Io(io) => Error::Io(io),
            lunar_common::Error::Config(msg) => Error::Config(msg),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using lunar-ap Error
pub type Result<T> = std::result::Result<T, Error>;
