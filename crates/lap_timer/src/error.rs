//! Lap timer errors

use std::time::Duration;

use contracts::CheckpointFault;
use thiserror::Error;

/// Terminal failure of one timed attempt
#[derive(Debug, Error)]
pub enum LapError {
    /// The lap was not completed before the deadline
    #[error("lap not completed within {timeout:?} (lap started: {lap_started}, mid passed: {mid_passed})")]
    Timeout {
        timeout: Duration,
        lap_started: bool,
        mid_passed: bool,
    },

    /// A checkpoint listener failed; the attempt cannot be judged
    #[error("checkpoint failure: {0}")]
    Checkpoint(CheckpointFault),

    /// The owner stopped the attempt
    #[error("lap attempt interrupted")]
    Interrupted,
}

impl LapError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, LapError>;
