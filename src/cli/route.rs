//! CLI route: run context and command dispatch.

use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{format_report_json, format_report_text};
use crate::config::{ConfigLoader, FrameTrackConfig};
use crate::error::ApiError;
use crate::registry::BrowserOptions;
use crate::replay::{load_trace, Replayer};
use crate::types::BrowserId;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

/// Runtime context for CLI execution: the effective configuration.
pub struct RunContext {
    config: FrameTrackConfig,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Build the context from an optional explicit config file.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn from_config(config: FrameTrackConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn config(&self) -> &FrameTrackConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Replay {
                trace,
                browser_id,
                format,
            } => {
                let events = load_trace(trace)?;
                info!(trace = %trace.display(), events = events.len(), "Replaying trace");
                let replayer = Replayer::new(
                    BrowserOptions::new(BrowserId(*browser_id)),
                    &self.config.registry,
                )?;
                let report = replayer.run(&events)?;
                match format {
                    OutputFormat::Json => format_report_json(&report),
                    OutputFormat::Text => Ok(format_report_text(
                        &report,
                        self.config.logging.color && std::io::stdout().is_terminal(),
                    )),
                }
            }
            Commands::Check { trace } => {
                let events = load_trace(trace)?;
                Ok(format!("{}: {} events", trace.display(), events.len()))
            }
            Commands::Config => {
                let mut out = String::new();
                if let Some(path) = &self.config_path {
                    out.push_str(&format!("# loaded from {}\n", path.display()));
                }
                out.push_str(
                    &toml::to_string_pretty(&self.config)
                        .map_err(|e| ApiError::OutputError(e.to_string()))?,
                );
                Ok(out)
            }
        }
    }
}
