//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, ReplayError};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ReplayError(ReplayError::Parse { line, message }) => {
            format!("Invalid trace at line {}: {}", line, message)
        }
        other => other.to_string(),
    }
}
