//! CollisionSource trait - checkpoint collision query abstraction
//!
//! Decouples the lap timer from the concrete collision monitor so the
//! timer can be driven by a live monitor or a scripted fake.

use crate::{CheckpointFault, CheckpointId};

/// Read side of the checkpoint flag vector.
///
/// Implementations must be cheap and non-blocking: the lap timer calls
/// [`CollisionSource::is_collision`] once per control tick at an
/// unbounded rate.
///
/// # Example
///
/// ```ignore
/// let monitor = CollisionMonitor::start(config);
/// if monitor.is_collision(CheckpointId::StartFinish) {
///     // vehicle is crossing the start line right now
/// }
/// monitor.close();
/// ```
pub trait CollisionSource: Send + Sync {
    /// Whether `checkpoint` is currently reporting a collision.
    ///
    /// Returns the most recently written flag value; never blocks.
    fn is_collision(&self, checkpoint: CheckpointId) -> bool;

    /// Pop the oldest unreported listener fault, if any.
    fn take_fault(&self) -> Option<CheckpointFault> {
        None
    }

    /// Stop all listeners.
    ///
    /// Idempotent; safe to call at any lifecycle stage.
    fn close(&self) {}
}
