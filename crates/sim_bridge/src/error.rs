//! Sim Bridge error types

use contracts::ContractError;
use thiserror::Error;

/// Simulator interface error
#[derive(Debug, Error)]
pub enum SimError {
    /// Simulator connection error
    #[error("failed to reach simulator: {message}")]
    ConnectionFailed { message: String },

    /// A control command was rejected
    #[error("simulator command '{command}' failed: {message}")]
    CommandFailed {
        command: &'static str,
        message: String,
    },

    /// Camera buffer does not match the expected resolution
    #[error("camera frame has {actual} bytes, expected {expected} for {width}x{height} RGB")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Writing a frame to disk failed
    #[error("failed to save camera frame: {0}")]
    Image(#[from] image::ImageError),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SimError {
    /// Create command failure error
    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command,
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SimError>;
