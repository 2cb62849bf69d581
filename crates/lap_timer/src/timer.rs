//! Polling lap timer.
//!
//! One attempt = one call to [`LapTimer::run`]. The loop is synchronous:
//! run it on a dedicated thread (`spawn_blocking`) when the collision
//! source lives on an async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{CollisionSource, ContractError, TimingConfig};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{LapError, Result};
use crate::hook::DriverHook;
use crate::state::{LapState, Transition};

/// Lap timer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapTimerConfig {
    /// Wall-clock budget for one attempt
    pub timeout: Duration,

    /// Pause after each poll; zero polls as fast as the hook returns
    pub tick_interval: Duration,
}

impl Default for LapTimerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(900),
            tick_interval: Duration::ZERO,
        }
    }
}

impl TryFrom<&TimingConfig> for LapTimerConfig {
    type Error = ContractError;

    fn try_from(timing: &TimingConfig) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            timeout: timing.timeout()?,
            tick_interval: timing.tick_interval(),
        })
    }
}

/// A completed lap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapOutcome {
    /// Time between the two start/finish crossings
    pub lap_time: Duration,

    /// Poll iterations the attempt took
    pub polls: u64,
}

/// Ends a running attempt from another thread
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Single-consumer lap timer
pub struct LapTimer {
    config: LapTimerConfig,
    clock: Arc<dyn Clock>,
    stop: StopHandle,
}

impl LapTimer {
    /// Timer on the host monotonic clock
    pub fn new(config: LapTimerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: LapTimerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            stop: StopHandle::default(),
        }
    }

    pub fn config(&self) -> &LapTimerConfig {
        &self.config
    }

    /// Handle that makes the current (or next) `run` return `Interrupted`
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Time one lap.
    ///
    /// Polls `source` for the expected checkpoint, then calls `hook` once,
    /// until the lap closes or the timeout expires. `source` is closed on
    /// every exit path.
    ///
    /// # Errors
    /// - `LapError::Timeout` when the deadline passes first
    /// - `LapError::Checkpoint` when the source reports a listener fault
    /// - `LapError::Interrupted` once the stop handle fired
    #[instrument(
        name = "lap_timer_run",
        skip_all,
        fields(timeout_s = self.config.timeout.as_secs_f64())
    )]
    pub fn run<C, S, H>(&self, source: &C, sim: &mut S, hook: &mut H) -> Result<LapOutcome>
    where
        C: CollisionSource + ?Sized,
        S: ?Sized,
        H: DriverHook<S> + ?Sized,
    {
        let mut polls = 0;
        let result = self.poll_loop(source, sim, hook, &mut polls);
        source.close();

        metrics::counter!("lap_judge_timer_polls_total").increment(polls);
        if let Err(LapError::Timeout { .. }) = &result {
            metrics::counter!("lap_judge_attempt_timeouts_total").increment(1);
        }
        result
    }

    fn poll_loop<C, S, H>(
        &self,
        source: &C,
        sim: &mut S,
        hook: &mut H,
        polls: &mut u64,
    ) -> Result<LapOutcome>
    where
        C: CollisionSource + ?Sized,
        S: ?Sized,
        H: DriverHook<S> + ?Sized,
    {
        let mut state = LapState::new(self.clock.now(), self.config.timeout);

        loop {
            if self.stop.is_stopped() {
                info!(polls = *polls, "lap attempt interrupted");
                return Err(LapError::Interrupted);
            }

            let now = self.clock.now();
            if state.is_expired(now) {
                warn!(
                    elapsed_ms = state.elapsed(now).as_millis() as u64,
                    lap_started = state.lap_started(),
                    mid_passed = state.mid_passed(),
                    "lap attempt timed out"
                );
                return Err(LapError::Timeout {
                    timeout: self.config.timeout,
                    lap_started: state.lap_started(),
                    mid_passed: state.mid_passed(),
                });
            }

            if let Some(fault) = source.take_fault() {
                warn!(checkpoint = %fault.checkpoint, kind = fault.kind.as_str(), "aborting attempt");
                return Err(LapError::Checkpoint(fault));
            }

            *polls += 1;
            let expected = state.expected();
            match state.observe(source.is_collision(expected), now) {
                Transition::Idle => {}
                Transition::LapStarted => {
                    info!(elapsed_ms = state.elapsed(now).as_millis() as u64, "lap started");
                }
                Transition::MidPassed => {
                    debug!(elapsed_ms = state.elapsed(now).as_millis() as u64, "mid checkpoint passed");
                }
                Transition::LapCompleted(lap_time) => {
                    info!(lap_time_s = lap_time.as_secs_f64(), polls = *polls, "lap completed");
                    return Ok(LapOutcome {
                        lap_time,
                        polls: *polls,
                    });
                }
            }

            hook.step(sim);

            if !self.config.tick_interval.is_zero() {
                std::thread::sleep(self.config.tick_interval);
            }
        }
    }
}
