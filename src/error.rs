//! Error types for the frame tracking system.
//!
//! Registry lookups and mutations never fail; these errors cover the
//! surfaces around the registry (construction, configuration, trace replay).

use crate::types::BrowserId;
use thiserror::Error;

/// Registry construction errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid browser id: {0:?} (must be positive)")]
    InvalidBrowserId(BrowserId),

    #[error("Failed to start sequencer thread: {0}")]
    SequencerSpawn(#[from] std::io::Error),
}

/// Trace replay errors
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Trace line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Trace line {line}: {message}")]
    InvalidEvent { line: usize, message: String },

    #[error("Trace I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Top-level errors surfaced by the CLI and ambient layers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Replay failed: {0}")]
    ReplayError(#[from] ReplayError),

    #[error("Registry error: {0}")]
    RegistryError(#[from] RegistryError),

    #[error("Output error: {0}")]
    OutputError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
