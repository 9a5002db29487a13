//! Shared error type for the Lunar Waves crates

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for lunar-common operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file that was explicitly named could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file was read but is not valid TOML for the target type
    #[error("Failed to parse config file {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Parsed values rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for any failure while loading or validating configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigRead { .. } | Error::ConfigParse { .. } | Error::Config(_)
        )
    }
}
