//! Configuration System
//!
//! Layered configuration for the registry, the sequencing thread and logging.
//! Sources, lowest to highest precedence: built-in defaults, the global
//! config file, an explicit config file, `FRAMETRACK_*` environment variables.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameTrackConfig {
    /// Frame registry behavior
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Sequencing thread settings
    #[serde(default)]
    pub sequencer: SequencerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Frame registry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Panic on invariant violations instead of only logging them
    #[serde(default = "default_strict_invariants")]
    pub strict_invariants: bool,

    /// Log a warning when a lookup has to return a speculative frame
    #[serde(default = "default_true")]
    pub warn_on_speculative_lookup: bool,
}

fn default_strict_invariants() -> bool {
    cfg!(debug_assertions)
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_invariants: default_strict_invariants(),
            warn_on_speculative_lookup: default_true(),
        }
    }
}

/// Sequencing thread settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Name given to the worker thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "frametrack-sequencer".to_string()
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Sequencer(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Sequencer(msg) => write!(f, "Sequencer: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FrameTrackConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.sequencer.thread_name.trim().is_empty() {
            errors.push(ValidationError::Sequencer(
                "Thread name cannot be empty".to_string(),
            ));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
