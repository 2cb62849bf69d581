//! Error types for CLI operations.

use contracts::TrackDirection;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Simulator command failed while bringing the session up or down
    #[error("Simulator {stage} failed: {message}")]
    Simulator {
        stage: &'static str,
        message: String,
    },

    /// A timed attempt ended without a lap; no score is reported
    #[error("{direction} attempt aborted: {reason}")]
    AttemptAborted {
        direction: TrackDirection,
        reason: String,
    },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn simulator(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Simulator {
            stage,
            message: message.into(),
        }
    }

    pub fn attempt_aborted(direction: TrackDirection, reason: impl Into<String>) -> Self {
        Self::AttemptAborted {
            direction,
            reason: reason.into(),
        }
    }
}
