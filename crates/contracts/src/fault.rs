//! Checkpoint faults surfaced from collision listeners to their owner.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CheckpointId;

/// Failure class of a checkpoint listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The listener could not establish its connection
    ConnectionFailed,
    /// The connection dropped before an event was delivered
    ConnectionClosed,
}

impl FaultKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FaultKind::ConnectionFailed => "connection_failed",
            FaultKind::ConnectionClosed => "connection_closed",
        }
    }
}

/// A fault reported by one checkpoint's listener.
///
/// Faults are local to their checkpoint; the other checkpoint keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFault {
    pub checkpoint: CheckpointId,
    pub kind: FaultKind,
    pub message: String,
}

impl fmt::Display for CheckpointFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checkpoint '{}' {}: {}",
            self.checkpoint,
            self.kind.as_str(),
            self.message
        )
    }
}
