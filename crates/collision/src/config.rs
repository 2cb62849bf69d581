//! Monitor configuration and counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use contracts::{CheckpointConfig, CheckpointId, CHECKPOINT_COUNT};

/// Collision monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Event source URL per checkpoint, indexed by `CheckpointId::index`
    pub endpoints: [String; CHECKPOINT_COUNT],

    /// How long a fired flag stays true before it is reset
    pub settle_delay: Duration,

    /// Upper bound on waiting for background tasks during shutdown
    pub shutdown_grace: Duration,

    /// Reopen a channel whose connection dropped without an event
    pub reopen_after_close: bool,
}

impl MonitorConfig {
    /// Create configuration with explicit endpoints and default timings
    pub fn new(start_finish: impl Into<String>, mid: impl Into<String>) -> Self {
        Self {
            endpoints: [start_finish.into(), mid.into()],
            ..Self::from(&CheckpointConfig::default())
        }
    }

    /// Override the settle delay
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Enable or disable reopening after a dropped connection
    pub fn with_reopen_after_close(mut self, reopen: bool) -> Self {
        self.reopen_after_close = reopen;
        self
    }

    /// Event source URL for `checkpoint`
    pub fn endpoint(&self, checkpoint: CheckpointId) -> &str {
        &self.endpoints[checkpoint.index()]
    }
}

impl From<&CheckpointConfig> for MonitorConfig {
    fn from(config: &CheckpointConfig) -> Self {
        Self {
            endpoints: CheckpointId::ALL.map(|cp| config.url(cp)),
            settle_delay: config.settle_delay(),
            shutdown_grace: config.shutdown_grace(),
            reopen_after_close: config.reopen_after_close,
        }
    }
}

/// Monitor counters
///
/// Mirrored into the `metrics` facade as they change; the atomics here
/// back the monitor's own diagnostics.
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    /// Collisions observed per checkpoint
    collisions: [AtomicU64; CHECKPOINT_COUNT],

    /// Channel faults (failed + closed)
    faults: AtomicU64,

    /// Channels opened over the monitor's lifetime
    channels_opened: AtomicU64,

    /// Background listeners currently alive
    live_listeners: AtomicUsize,
}

impl MonitorMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a collision
    pub fn record_collision(&self, checkpoint: CheckpointId) {
        self.collisions[checkpoint.index()].fetch_add(1, Ordering::Relaxed);
        metrics::counter!("lap_judge_collisions_total", "checkpoint" => checkpoint.as_str())
            .increment(1);
    }

    /// Record a channel fault
    pub fn record_fault(&self, checkpoint: CheckpointId, kind: &'static str) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "lap_judge_channel_faults_total",
            "checkpoint" => checkpoint.as_str(),
            "kind" => kind
        )
        .increment(1);
    }

    /// Record a channel being opened
    pub fn record_opened(&self) {
        self.channels_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn listener_started(&self) {
        let live = self.live_listeners.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::gauge!("lap_judge_live_listeners").set(live as f64);
    }

    pub(crate) fn listener_stopped(&self) {
        let live = self.live_listeners.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::gauge!("lap_judge_live_listeners").set(live as f64);
    }

    /// Collisions observed at `checkpoint`
    pub fn collisions(&self, checkpoint: CheckpointId) -> u64 {
        self.collisions[checkpoint.index()].load(Ordering::Relaxed)
    }

    /// Background listeners currently alive
    pub fn live_listeners(&self) -> usize {
        self.live_listeners.load(Ordering::Acquire)
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            collisions: CheckpointId::ALL.map(|cp| self.collisions(cp)),
            faults: self.faults.load(Ordering::Relaxed),
            channels_opened: self.channels_opened.load(Ordering::Relaxed),
            live_listeners: self.live_listeners(),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Collisions per checkpoint, indexed by `CheckpointId::index`
    pub collisions: [u64; CHECKPOINT_COUNT],

    /// Channel faults
    pub faults: u64,

    /// Channels opened
    pub channels_opened: u64,

    /// Background listeners alive at snapshot time
    pub live_listeners: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_checkpoints() {
        let config = MonitorConfig::from(&CheckpointConfig::default());
        assert_eq!(config.endpoint(CheckpointId::StartFinish), "ws://localhost:9000");
        assert_eq!(config.endpoint(CheckpointId::Mid), "ws://localhost:9001");
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert!(!config.reopen_after_close);
    }

    #[test]
    fn test_listener_gauge_tracks_balance() {
        let metrics = MonitorMetrics::new();
        metrics.listener_started();
        metrics.listener_started();
        metrics.listener_stopped();
        assert_eq!(metrics.live_listeners(), 1);

        metrics.record_collision(CheckpointId::Mid);
        let snap = metrics.snapshot();
        assert_eq!(snap.collisions, [0, 1]);
        assert_eq!(snap.live_listeners, 1);
    }
}
