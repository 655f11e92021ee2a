//! Config loader: builds a `FrameTrackConfig` from layered sources.

use crate::config::merge::merge_policy;
use crate::config::sources::{env, explicit_file, global_file};
use crate::config::FrameTrackConfig;
use crate::error::ApiError;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from every source.
    ///
    /// Precedence (highest first): environment, `explicit` file, global file,
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<FrameTrackConfig, ApiError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = explicit_file::add_to_builder(builder, path)?;
        }
        builder = env::add_to_builder(builder);

        let config: FrameTrackConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<FrameTrackConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = explicit_file::add_to_builder(builder, path)?;
        let config: FrameTrackConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Built-in defaults only
    pub fn default() -> FrameTrackConfig {
        FrameTrackConfig::default()
    }

    fn validated(config: FrameTrackConfig) -> Result<FrameTrackConfig, ApiError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        debug!(
            strict_invariants = config.registry.strict_invariants,
            thread_name = %config.sequencer.thread_name,
            "Configuration loaded"
        );
        Ok(config)
    }
}
