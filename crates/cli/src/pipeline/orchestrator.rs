//! Judging run orchestrator - coordinates simulator, monitor, timer and sinks.
//!
//! One run is: stop → settle → start → settle, then one timed attempt per
//! track direction (random order), each with its own `CollisionMonitor`,
//! then the score goes to the sinks. Any attempt that ends without a lap
//! ends the run without a score.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use collision::{ChannelState, CollisionMonitor, MonitorConfig};
use contracts::{CheckpointId, JudgeBlueprint, LapRecord, ScoreCard, TrackDirection};
use lap_timer::{DriverHook, LapError, LapOutcome, LapTimer, LapTimerConfig};
use observability::AttemptOutcome;
use scoreboard::ScoreReporter;
use sim_bridge::{Simulator, TrackPlanner};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{AttemptRecord, RunOutcome, RunStats};
use crate::error::CliError;

/// Upper bound on waiting for both checkpoint listeners to connect
const LISTEN_WAIT: Duration = Duration::from_secs(2);

/// Judging run configuration
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// The judge configuration (overrides already applied)
    pub blueprint: JudgeBlueprint,

    /// Submit the score to the configured sinks
    pub submit: bool,

    /// Save the last camera frame of each attempt here
    pub snapshot_dir: Option<PathBuf>,
}

/// One judging run over a simulator and a driving policy
pub struct JudgeRun<S, H> {
    config: JudgeConfig,
    sim: S,
    hook: H,
    planner: TrackPlanner,
}

impl<S, H> JudgeRun<S, H>
where
    S: Simulator + 'static,
    H: DriverHook<S> + Send + 'static,
{
    pub fn new(config: JudgeConfig, sim: S, hook: H) -> Self {
        let planner = TrackPlanner::new(config.blueprint.tracks.clone());
        Self {
            config,
            sim,
            hook,
            planner,
        }
    }

    /// Replace the direction planner
    #[cfg(test)]
    pub fn with_planner(mut self, planner: TrackPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Run both attempts and report the score.
    ///
    /// Attempt failures are reported through `RunStats::outcome`; `Err` is
    /// reserved for infrastructure failures (simulator, monitor, sinks).
    /// `interrupt` stops the current attempt and skips the rest; cleanup
    /// runs on every path.
    #[instrument(name = "judge_run", skip_all)]
    pub async fn run(self, interrupt: CancellationToken) -> Result<RunStats> {
        let started = Instant::now();
        let Self {
            config,
            mut sim,
            mut hook,
            planner,
        } = self;

        let timing = LapTimerConfig::try_from(&config.blueprint.timing)
            .context("Invalid timing configuration")?;

        let reporter = if config.submit {
            if config.blueprint.sinks.is_empty() {
                warn!("No sinks configured - the score will only be printed");
            }
            Some(
                ScoreReporter::from_configs(&config.blueprint.sinks)
                    .context("Failed to create score sinks")?,
            )
        } else {
            None
        };

        bring_up(&mut sim, &config.blueprint).await?;

        let mut stats = RunStats::default();
        let mut laps = Vec::with_capacity(2);
        let mut failure: Option<anyhow::Error> = None;

        for (index, attempt) in planner.plan().into_iter().enumerate() {
            if interrupt.is_cancelled() {
                stats.outcome = RunOutcome::Interrupted;
                break;
            }

            if let Err(e) = sim.reset_car_pose(&attempt.pose) {
                failure = Some(CliError::simulator("reset_car_pose", e.to_string()).into());
                break;
            }

            let monitor = match CollisionMonitor::start(MonitorConfig::from(
                &config.blueprint.checkpoints,
            )) {
                Ok(monitor) => monitor,
                Err(e) => {
                    failure =
                        Some(anyhow::Error::new(e).context("Failed to start collision monitor"));
                    break;
                }
            };

            let timer = LapTimer::new(timing);
            let (result, sim_back, hook_back) =
                match run_attempt(attempt.direction, monitor, timer, sim, hook, &interrupt).await {
                    Ok(parts) => parts,
                    Err(e) => {
                        // The simulator went down with the attempt task
                        if let Some(reporter) = reporter {
                            reporter.shutdown().await;
                        }
                        return Err(e);
                    }
                };
            sim = sim_back;
            hook = hook_back;

            if let Some(dir) = &config.snapshot_dir {
                save_snapshot(&mut sim, dir, index, attempt.direction);
            }

            match record_attempt(&mut stats, attempt.direction, result) {
                Some(lap) => laps.push(lap),
                None => break,
            }
        }

        if let [first, second] = laps.as_slice() {
            stats.score = ScoreCard::from_laps(*first, *second);
        }

        if let (Some(card), Some(reporter)) = (&stats.score, &reporter) {
            let summary = reporter.report(card).await;
            observability::record_report(summary.accepted_count(), summary.failures.len());
            stats.report = Some(summary);
        }

        if let Some(reporter) = reporter {
            reporter.shutdown().await;
        }
        if let Err(e) = sim.stop() {
            warn!(error = %e, "Failed to stop simulator during cleanup");
        }

        if let Some(e) = failure {
            return Err(e);
        }

        stats.duration = started.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            attempts = stats.attempts.len(),
            forward_lap_s = stats.lap_time(TrackDirection::Forward).map(|d| d.as_secs_f64()),
            backward_lap_s = stats.lap_time(TrackDirection::Backward).map(|d| d.as_secs_f64()),
            scored = stats.score.is_some(),
            "Judging run finished"
        );
        Ok(stats)
    }
}

/// stop → settle → start → settle
#[instrument(name = "judge_bring_up", skip_all)]
async fn bring_up<S: Simulator>(sim: &mut S, blueprint: &JudgeBlueprint) -> Result<()> {
    let simulator = &blueprint.simulator;
    info!(host = %simulator.host, port = simulator.port, "Restarting simulation");

    sim.stop()
        .map_err(|e| CliError::simulator("stop", e.to_string()))?;
    tokio::time::sleep(Duration::from_millis(simulator.settle_after_stop_ms)).await;

    sim.start()
        .map_err(|e| CliError::simulator("start", e.to_string()))?;
    tokio::time::sleep(Duration::from_millis(simulator.settle_after_start_ms)).await;

    debug!("Simulation running");
    Ok(())
}

type AttemptParts<S, H> = (lap_timer::Result<LapOutcome>, S, H);

/// Time one lap on a blocking thread against a fresh monitor.
///
/// The simulator and hook come back with the result; `Err` means the
/// timer thread panicked and took them along.
#[instrument(name = "judge_attempt", skip_all, fields(direction = %direction))]
async fn run_attempt<S, H>(
    direction: TrackDirection,
    monitor: CollisionMonitor,
    timer: LapTimer,
    mut sim: S,
    mut hook: H,
    interrupt: &CancellationToken,
) -> Result<AttemptParts<S, H>>
where
    S: Simulator + 'static,
    H: DriverHook<S> + Send + 'static,
{
    let monitor = Arc::new(monitor);
    wait_listening(&monitor, LISTEN_WAIT).await;

    let stop = timer.stop_handle();
    let canceller = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            interrupt.cancelled().await;
            stop.stop();
        })
    };

    info!(direction = %direction, "Timing attempt");
    let source = Arc::clone(&monitor);
    let joined = tokio::task::spawn_blocking(move || {
        let result = timer.run(source.as_ref(), &mut sim, &mut hook);
        (result, sim, hook)
    })
    .await;
    canceller.abort();

    match Arc::try_unwrap(monitor) {
        Ok(monitor) => {
            if !monitor.shutdown().await {
                warn!("Collision monitor did not shut down cleanly");
            }
        }
        Err(monitor) => monitor.close(),
    }

    joined.context("Lap timer task panicked")
}

/// Listeners connect asynchronously; give them a head start before the
/// car moves. A listener that fails surfaces as a fault in the timer.
async fn wait_listening(monitor: &CollisionMonitor, limit: Duration) {
    let deadline = Instant::now() + limit;
    loop {
        let listening = CheckpointId::ALL
            .iter()
            .all(|&cp| monitor.channel_state(cp) == ChannelState::Listening);
        if listening {
            return;
        }
        if Instant::now() >= deadline {
            warn!(
                start_finish = ?monitor.channel_state(CheckpointId::StartFinish),
                mid = ?monitor.channel_state(CheckpointId::Mid),
                "Checkpoint listeners not ready, starting anyway"
            );
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Fold one attempt result into the stats; `None` ends the run.
fn record_attempt(
    stats: &mut RunStats,
    direction: TrackDirection,
    result: lap_timer::Result<LapOutcome>,
) -> Option<LapRecord> {
    let (record, outcome) = match result {
        Ok(outcome) => {
            info!(
                direction = %direction,
                lap_time_s = outcome.lap_time.as_secs_f64(),
                "Lap completed"
            );
            observability::record_lap(direction, outcome.lap_time);
            stats
                .lap_metrics
                .record_lap(direction, outcome.lap_time, outcome.polls);
            stats.attempts.push(AttemptRecord {
                direction,
                result: Ok(outcome.lap_time),
                polls: outcome.polls,
            });
            (
                Some(LapRecord::new(direction, outcome.lap_time)),
                AttemptOutcome::Completed,
            )
        }
        Err(e) => {
            let attempt_outcome = match &e {
                LapError::Timeout { .. } => {
                    stats.lap_metrics.record_timeout();
                    AttemptOutcome::TimedOut
                }
                LapError::Checkpoint(fault) => {
                    stats.lap_metrics.record_fault(fault);
                    AttemptOutcome::Faulted
                }
                LapError::Interrupted => {
                    stats.lap_metrics.record_interrupted();
                    AttemptOutcome::Interrupted
                }
            };
            warn!(direction = %direction, error = %e, "Attempt ended without a lap");

            stats.outcome = match e {
                LapError::Interrupted => RunOutcome::Interrupted,
                ref other => RunOutcome::Aborted {
                    direction,
                    reason: other.to_string(),
                },
            };
            stats.attempts.push(AttemptRecord {
                direction,
                result: Err(e.to_string()),
                polls: 0,
            });
            (None, attempt_outcome)
        }
    };

    observability::record_attempt(direction, outcome);
    record
}

fn save_snapshot<S: Simulator>(
    sim: &mut S,
    dir: &std::path::Path,
    index: usize,
    direction: TrackDirection,
) {
    let path = dir.join(format!("attempt-{}-{}.png", index + 1, direction));
    let saved = std::fs::create_dir_all(dir)
        .map_err(|e| e.to_string())
        .and_then(|()| sim.get_image().map_err(|e| e.to_string()))
        .and_then(|frame| frame.save_png(&path).map_err(|e| e.to_string()));

    match saved {
        Ok(()) => info!(path = %path.display(), "Camera snapshot saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save camera snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CruisePolicy;
    use collision::MockTrackside;
    use contracts::{CheckpointFault, FaultKind, TrackConfig};
    use sim_bridge::{MockCourse, MockSimulator, VehicleLimits};

    const LAP_LENGTH: f64 = 4.0;

    /// Blueprint pointing at the trackside, with short settles
    fn blueprint(trackside: &MockTrackside, timeout_s: f64) -> JudgeBlueprint {
        let mut blueprint = JudgeBlueprint::default();
        blueprint.simulator.settle_after_stop_ms = 0;
        blueprint.simulator.settle_after_start_ms = 0;
        blueprint.checkpoints.host = "127.0.0.1".into();
        blueprint.checkpoints.start_finish_port =
            trackside.server(CheckpointId::StartFinish).addr().port();
        blueprint.checkpoints.mid_port = trackside.server(CheckpointId::Mid).addr().port();
        blueprint.checkpoints.settle_delay_ms = 50;
        blueprint.timing.timeout_s = timeout_s;
        blueprint.timing.tick_interval_ms = 5;
        blueprint
    }

    /// Forward first, cruising at `speed` over the trackside course
    fn judge(
        trackside: &MockTrackside,
        blueprint: JudgeBlueprint,
        speed: f64,
    ) -> JudgeRun<MockSimulator, CruisePolicy> {
        let sim = MockSimulator::new(VehicleLimits::default())
            .with_course(MockCourse::new(LAP_LENGTH, trackside.crossing_callback()))
            .realtime();
        let config = JudgeConfig {
            blueprint,
            submit: false,
            snapshot_dir: None,
        };
        JudgeRun::new(config, sim, CruisePolicy::new(speed)).with_planner(TrackPlanner::new(
            TrackConfig {
                randomize_order: false,
                ..Default::default()
            },
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_scores_both_directions() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let run = judge(&trackside, blueprint(&trackside, 10.0), LAP_LENGTH);

        let stats = run.run(CancellationToken::new()).await.unwrap();
        trackside.shutdown().await;

        assert_eq!(stats.outcome, RunOutcome::Scored);
        assert_eq!(stats.attempts.len(), 2);
        assert_eq!(stats.attempts[0].direction, TrackDirection::Forward);
        assert_eq!(stats.attempts[1].direction, TrackDirection::Backward);

        let forward = stats.lap_time(TrackDirection::Forward).unwrap();
        let backward = stats.lap_time(TrackDirection::Backward).unwrap();
        for lap in [forward, backward] {
            assert!(
                (0.7..2.0).contains(&lap.as_secs_f64()),
                "lap took {lap:?}"
            );
        }

        let card = stats.score.unwrap();
        assert_eq!(card.forward_laptime, LapRecord::new(TrackDirection::Forward, forward).duration_s);
        assert_eq!(card.backward_laptime, LapRecord::new(TrackDirection::Backward, backward).duration_s);
        assert!(stats.report.is_none());
        assert_eq!(stats.lap_metrics.completed, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timeout_skips_second_attempt() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let run = judge(&trackside, blueprint(&trackside, 0.3), 0.0);

        let stats = run.run(CancellationToken::new()).await.unwrap();
        trackside.shutdown().await;

        assert!(matches!(
            stats.outcome,
            RunOutcome::Aborted {
                direction: TrackDirection::Forward,
                ..
            }
        ));
        assert_eq!(stats.attempts.len(), 1);
        assert!(stats.attempts[0].result.is_err());
        assert!(stats.score.is_none());
        assert_eq!(stats.lap_metrics.timeouts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interrupt_stops_running_attempt() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let run = judge(&trackside, blueprint(&trackside, 30.0), 0.0);

        let interrupt = CancellationToken::new();
        tokio::spawn({
            let interrupt = interrupt.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                interrupt.cancel();
            }
        });

        let started = Instant::now();
        let stats = run.run(interrupt).await.unwrap();
        trackside.shutdown().await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(stats.outcome, RunOutcome::Interrupted);
        assert_eq!(stats.attempts.len(), 1);
        assert!(stats.score.is_none());
        assert_eq!(stats.lap_metrics.interrupted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interrupt_before_first_attempt() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let run = judge(&trackside, blueprint(&trackside, 30.0), LAP_LENGTH);

        let interrupt = CancellationToken::new();
        interrupt.cancel();
        let stats = run.run(interrupt).await.unwrap();
        trackside.shutdown().await;

        assert_eq!(stats.outcome, RunOutcome::Interrupted);
        assert!(stats.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_is_an_error() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let run = judge(&trackside, blueprint(&trackside, f64::INFINITY), LAP_LENGTH);

        let err = run.run(CancellationToken::new()).await.unwrap_err();
        trackside.shutdown().await;
        assert!(err.to_string().contains("timing"), "got: {err:#}");
    }

    #[test]
    fn test_record_completed_attempt() {
        let mut stats = RunStats::default();
        let lap = record_attempt(
            &mut stats,
            TrackDirection::Forward,
            Ok(LapOutcome {
                lap_time: Duration::from_millis(61_500),
                polls: 615,
            }),
        )
        .unwrap();

        assert_eq!(lap.duration_s, 61.5);
        assert_eq!(stats.outcome, RunOutcome::Scored);
        assert_eq!(stats.lap_metrics.completed, 1);
    }

    #[test]
    fn test_record_fault_aborts_run() {
        let mut stats = RunStats::default();
        let fault = CheckpointFault {
            checkpoint: CheckpointId::Mid,
            kind: FaultKind::ConnectionClosed,
            message: "closed".into(),
        };
        let lap = record_attempt(
            &mut stats,
            TrackDirection::Backward,
            Err(LapError::Checkpoint(fault)),
        );

        assert!(lap.is_none());
        assert!(matches!(
            stats.outcome,
            RunOutcome::Aborted {
                direction: TrackDirection::Backward,
                ..
            }
        ));
        assert_eq!(stats.lap_metrics.faults, 1);
    }

    #[test]
    fn test_record_interrupt() {
        let mut stats = RunStats::default();
        let lap = record_attempt(&mut stats, TrackDirection::Forward, Err(LapError::Interrupted));
        assert!(lap.is_none());
        assert_eq!(stats.outcome, RunOutcome::Interrupted);
        assert_eq!(stats.lap_metrics.interrupted, 1);
    }
}
