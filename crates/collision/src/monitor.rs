//! CollisionMonitor - checkpoint flag vector and channel lifecycle
//!
//! The monitor keeps one live `CollisionChannel` per checkpoint. A
//! background supervisor task consumes channel events and runs the
//! fire → hold → reset → reopen cycle; the polling side only ever reads
//! an atomic flag.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{CheckpointFault, CheckpointId, CollisionSource, FaultKind, CHECKPOINT_COUNT};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::channel::{ChannelEvent, ChannelState, CollisionChannel};
use crate::config::{MonitorConfig, MonitorMetrics, MonitorSnapshot};
use crate::error::{CollisionError, Result};

type Flags = [AtomicBool; CHECKPOINT_COUNT];
type ChannelSlots = [Option<CollisionChannel>; CHECKPOINT_COUNT];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Checkpoint collision monitor
///
/// `is_collision` is a single atomic load and never blocks. Each
/// checkpoint's flag has exactly one writer: the supervisor task.
///
/// Dropping the monitor closes it.
pub struct CollisionMonitor {
    config: MonitorConfig,
    flags: Arc<Flags>,
    channels: Arc<Mutex<ChannelSlots>>,
    faults: Arc<Mutex<VecDeque<CheckpointFault>>>,
    metrics: Arc<MonitorMetrics>,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<bool>>>,
}

impl CollisionMonitor {
    /// Open one channel per checkpoint and start the supervisor.
    ///
    /// # Errors
    /// `CollisionError::NoRuntime` when called outside a tokio runtime.
    #[instrument(name = "collision_monitor_start", skip(config))]
    pub fn start(config: MonitorConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| CollisionError::NoRuntime)?;

        let flags: Arc<Flags> = Arc::new(Default::default());
        let channels: Arc<Mutex<ChannelSlots>> = Arc::new(Mutex::new(Default::default()));
        let faults = Arc::new(Mutex::new(VecDeque::new()));
        let metrics = Arc::new(MonitorMetrics::new());
        let shutdown = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut supervisor = Supervisor {
            config: config.clone(),
            flags: flags.clone(),
            channels: channels.clone(),
            faults: faults.clone(),
            metrics: metrics.clone(),
            shutdown: shutdown.clone(),
            generations: [0; CHECKPOINT_COUNT],
            holds: [None; CHECKPOINT_COUNT],
            events_tx,
            events_rx,
        };
        for checkpoint in CheckpointId::ALL {
            supervisor.open_channel(checkpoint);
        }
        let task = handle.spawn(supervisor.run());

        info!(
            start_finish = %config.endpoint(CheckpointId::StartFinish),
            mid = %config.endpoint(CheckpointId::Mid),
            settle_delay_ms = config.settle_delay.as_millis() as u64,
            "collision monitor started"
        );

        Ok(Self {
            config,
            flags,
            channels,
            faults,
            metrics,
            shutdown,
            supervisor: Mutex::new(Some(task)),
        })
    }

    /// Whether `checkpoint` is currently reporting a collision
    pub fn is_collision(&self, checkpoint: CheckpointId) -> bool {
        self.flags[checkpoint.index()].load(Ordering::Acquire)
    }

    /// Pop the oldest unreported channel fault
    pub fn take_fault(&self) -> Option<CheckpointFault> {
        lock(&self.faults).pop_front()
    }

    /// Lifecycle state of `checkpoint`'s channel.
    ///
    /// Reports `Fired` for the whole hold window after a collision.
    pub fn channel_state(&self, checkpoint: CheckpointId) -> ChannelState {
        if self.is_collision(checkpoint) {
            return ChannelState::Fired;
        }
        lock(&self.channels)[checkpoint.index()]
            .as_ref()
            .map_or(ChannelState::Closed, CollisionChannel::state)
    }

    /// Background listeners currently alive
    pub fn live_listeners(&self) -> usize {
        self.metrics.live_listeners()
    }

    /// Collisions observed at `checkpoint` since start
    pub fn collisions_observed(&self, checkpoint: CheckpointId) -> u64 {
        self.metrics.collisions(checkpoint)
    }

    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        self.metrics.clone()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Close every channel and stop the supervisor.
    ///
    /// Idempotent. Signals only; listeners exit at their next await point.
    pub fn close(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        for slot in lock(&self.channels).iter_mut() {
            if let Some(channel) = slot.take() {
                channel.close();
            }
        }
        for flag in self.flags.iter() {
            flag.store(false, Ordering::Release);
        }
        info!("collision monitor closed");
    }

    /// Close and wait up to the configured grace for background tasks
    ///
    /// Returns whether every task finished within the grace period.
    pub async fn shutdown(self) -> bool {
        self.close();
        let grace = self.config.shutdown_grace;
        let Some(task) = lock(&self.supervisor).take() else {
            return true;
        };
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => {
                warn!(error = %e, "collision supervisor task failed");
                false
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "collision supervisor did not stop in time, abandoning"
                );
                false
            }
        }
    }
}

impl CollisionSource for CollisionMonitor {
    fn is_collision(&self, checkpoint: CheckpointId) -> bool {
        CollisionMonitor::is_collision(self, checkpoint)
    }

    fn take_fault(&self) -> Option<CheckpointFault> {
        CollisionMonitor::take_fault(self)
    }

    fn close(&self) {
        CollisionMonitor::close(self)
    }
}

impl Drop for CollisionMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owner of the channel lifecycle. Runs as a single tokio task.
struct Supervisor {
    config: MonitorConfig,
    flags: Arc<Flags>,
    channels: Arc<Mutex<ChannelSlots>>,
    faults: Arc<Mutex<VecDeque<CheckpointFault>>>,
    metrics: Arc<MonitorMetrics>,
    shutdown: CancellationToken,
    /// Generation of the live channel per checkpoint
    generations: [u64; CHECKPOINT_COUNT],
    /// Pending reset-and-reopen deadline per checkpoint
    holds: [Option<Instant>; CHECKPOINT_COUNT],
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Supervisor {
    /// Returns whether every listener stopped within the grace period.
    async fn run(mut self) -> bool {
        loop {
            let next_hold = self.holds.iter().flatten().min().copied();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = sleep_until(next_hold.unwrap_or_else(Instant::now)), if next_hold.is_some() => {
                    self.expire_holds(Instant::now());
                }
            }
        }

        self.drain().await
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Triggered {
                checkpoint,
                generation,
            } => {
                if self.is_stale(checkpoint, generation) {
                    return;
                }
                self.on_triggered(checkpoint);
            }
            ChannelEvent::Faulted {
                checkpoint,
                generation,
                error,
            } => {
                if self.is_stale(checkpoint, generation) {
                    return;
                }
                self.on_faulted(checkpoint, error);
            }
        }
    }

    fn is_stale(&self, checkpoint: CheckpointId, generation: u64) -> bool {
        let current = self.generations[checkpoint.index()];
        if generation != current {
            debug!(%checkpoint, generation, current, "ignoring event from recycled channel");
            return true;
        }
        false
    }

    fn on_triggered(&mut self, checkpoint: CheckpointId) {
        let idx = checkpoint.index();
        self.flags[idx].store(true, Ordering::Release);
        self.metrics.record_collision(checkpoint);
        info!(%checkpoint, generation = self.generations[idx], "checkpoint collision");

        // the fired channel is closed before any replacement exists
        self.close_channel(checkpoint);
        self.holds[idx] = Some(Instant::now() + self.config.settle_delay);
    }

    fn on_faulted(&mut self, checkpoint: CheckpointId, error: CollisionError) {
        let idx = checkpoint.index();
        self.close_channel(checkpoint);

        let Some(fault) = error.to_fault() else {
            return;
        };
        self.metrics.record_fault(checkpoint, fault.kind.as_str());

        if fault.kind == FaultKind::ConnectionClosed && self.config.reopen_after_close {
            warn!(%checkpoint, error = %error, "checkpoint connection dropped, reopening");
            self.holds[idx] = Some(Instant::now() + self.config.settle_delay);
            return;
        }

        warn!(%checkpoint, error = %error, "checkpoint unavailable");
        lock(&self.faults).push_back(fault);
    }

    fn expire_holds(&mut self, now: Instant) {
        for checkpoint in CheckpointId::ALL {
            let idx = checkpoint.index();
            match self.holds[idx] {
                Some(deadline) if deadline <= now => {
                    self.holds[idx] = None;
                    self.flags[idx].store(false, Ordering::Release);
                    self.open_channel(checkpoint);
                }
                _ => {}
            }
        }
    }

    fn open_channel(&mut self, checkpoint: CheckpointId) {
        let idx = checkpoint.index();
        let mut channels = lock(&self.channels);
        // close() cancels before taking this lock, so nothing opens after it
        if self.shutdown.is_cancelled() {
            return;
        }

        self.generations[idx] += 1;
        let channel = CollisionChannel::open(
            checkpoint,
            self.config.endpoint(checkpoint),
            self.generations[idx],
            self.events_tx.clone(),
            self.metrics.clone(),
        );
        self.metrics.record_opened();

        if let Some(previous) = channels[idx].replace(channel) {
            previous.close();
        }
    }

    fn close_channel(&self, checkpoint: CheckpointId) {
        if let Some(channel) = lock(&self.channels)[checkpoint.index()].take() {
            channel.close();
        }
    }

    /// Wait for closed listeners to release their connections.
    async fn drain(&self) -> bool {
        let deadline = Instant::now() + self.config.shutdown_grace;
        while self.metrics.live_listeners() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    live = self.metrics.live_listeners(),
                    "collision listeners still alive after grace period"
                );
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        debug!("collision supervisor stopped");
        true
    }
}
