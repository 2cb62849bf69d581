//! Scoreboard error types

use thiserror::Error;

/// Scoreboard-specific errors
#[derive(Debug, Error)]
pub enum ScoreboardError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink worker is gone
    #[error("sink '{sink_name}' worker stopped")]
    WorkerStopped { sink_name: String },

    /// Sink submit error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoreboardError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ScoreboardError>;
