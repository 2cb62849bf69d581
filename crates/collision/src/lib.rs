//! # Collision
//!
//! Checkpoint collision monitoring.
//!
//! Responsibilities:
//! - Hold one WebSocket listener per checkpoint (`CollisionChannel`)
//! - Turn each collision event into exactly one observable flag pulse
//! - Recycle listeners after every event, surface connection faults
//!
//! ## Usage Example
//!
//! ```ignore
//! use collision::{CollisionMonitor, MonitorConfig};
//! use contracts::CheckpointId;
//!
//! let monitor = CollisionMonitor::start(MonitorConfig::from(&blueprint.checkpoints))?;
//! loop {
//!     if monitor.is_collision(CheckpointId::StartFinish) {
//!         // crossing the start line
//!     }
//! }
//! monitor.close();
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use collision::MockCheckpointServer;
//!
//! let server = MockCheckpointServer::bind().await?;
//! let config = MonitorConfig::new(server.url(), mid.url());
//! server.trigger().await;
//!
//! // Both checkpoints, driven by a mock course
//! let trackside = MockTrackside::bind_local().await?;
//! let course = MockCourse::new(4.0, trackside.crossing_callback());
//! let monitor = CollisionMonitor::start(trackside.monitor_config())?;
//! ```

mod channel;
mod config;
mod error;
mod mock;
mod monitor;
mod trackside;

// Re-exports
pub use channel::{ChannelEvent, ChannelState, CollisionChannel};
pub use config::{MonitorConfig, MonitorMetrics, MonitorSnapshot};
pub use error::{CollisionError, Result};
pub use mock::MockCheckpointServer;
pub use monitor::CollisionMonitor;
pub use trackside::MockTrackside;
