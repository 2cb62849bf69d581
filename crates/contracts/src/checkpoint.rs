//! CheckpointId - identifier of a timing checkpoint on the track
//!
//! The set is closed: one start/finish checkpoint and one midpoint
//! checkpoint. Per-checkpoint state is stored in fixed-size arrays indexed
//! by [`CheckpointId::index`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of checkpoints on a track. Never grows at runtime.
pub const CHECKPOINT_COUNT: usize = 2;

/// Timing checkpoint identifier.
///
/// # Examples
/// ```
/// use contracts::CheckpointId;
///
/// let cp = CheckpointId::StartFinish;
/// assert_eq!(cp.index(), 0);
/// assert_eq!(cp.other(), CheckpointId::Mid);
/// assert_eq!(CheckpointId::from_index(1), Some(CheckpointId::Mid));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointId {
    /// Start/finish line
    StartFinish,
    /// Midpoint of the circuit
    Mid,
}

impl CheckpointId {
    /// All checkpoints in index order
    pub const ALL: [CheckpointId; CHECKPOINT_COUNT] = [CheckpointId::StartFinish, CheckpointId::Mid];

    /// Slot index used for per-checkpoint arrays
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            CheckpointId::StartFinish => 0,
            CheckpointId::Mid => 1,
        }
    }

    /// Reverse of [`CheckpointId::index`]
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(CheckpointId::StartFinish),
            1 => Some(CheckpointId::Mid),
            _ => None,
        }
    }

    /// The checkpoint a lap expects after this one
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            CheckpointId::StartFinish => CheckpointId::Mid,
            CheckpointId::Mid => CheckpointId::StartFinish,
        }
    }

    /// Stable label for logs and metric labels
    pub const fn as_str(self) -> &'static str {
        match self {
            CheckpointId::StartFinish => "start_finish",
            CheckpointId::Mid => "mid",
        }
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
