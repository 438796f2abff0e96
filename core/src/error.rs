//! Error types for provisioning and launching.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for provisioning and launch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching the source tree failed.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Installing the automation package failed.
    #[error("install of '{package}' failed: {reason}")]
    Install { package: String, reason: String },

    /// Placing the entrypoint script failed.
    #[error("failed to place entrypoint {path}: {reason}")]
    Entrypoint { path: PathBuf, reason: String },

    /// The entrypoint could not be started.
    #[error("failed to launch {path}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recipe or binding configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The image manifest could not be read or written.
    #[error("image manifest error at {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// IO error during provisioning.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;
