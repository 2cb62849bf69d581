//! # Contracts
//!
//! Frozen interface contracts shared by every judge crate: checkpoint
//! identifiers, track poses, the judge configuration blueprint, fault and
//! score types, and the `CollisionSource` / `ScoreSink` traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Lap timing uses the host's monotonic clock, never simulation time
//! - Durations cross crate boundaries as `std::time::Duration`; scores are
//!   reported in seconds (`f64`)

mod blueprint;
mod checkpoint;
mod collision_source;
mod error;
mod fault;
mod score;
mod sink;
mod track;

pub use blueprint::*;
pub use checkpoint::{CheckpointId, CHECKPOINT_COUNT};
pub use collision_source::CollisionSource;
pub use error::*;
pub use fault::{CheckpointFault, FaultKind};
pub use score::*;
pub use sink::*;
pub use track::*;
