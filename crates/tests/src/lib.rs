//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件到各模块配置的贯通
//! - 模拟 e2e 测试（Mock 检查点服务 + Mock 仿真器，无需真实仿真器）
//! - 成绩上报落盘

#[cfg(test)]
mod contract_tests {
    use contracts::{CheckpointId, JudgeBlueprint};

    #[test]
    fn test_default_blueprint_is_valid() {
        let blueprint = JudgeBlueprint::default();
        assert!(config_loader::ConfigLoader::validate(&blueprint).is_ok());
        assert_ne!(
            blueprint.checkpoints.port(CheckpointId::StartFinish),
            blueprint.checkpoints.port(CheckpointId::Mid)
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use collision::{
        ChannelState, CollisionMonitor, MockCheckpointServer, MockTrackside, MonitorConfig,
    };
    use contracts::{
        CheckpointId, FaultKind, LapRecord, ScoreCard, SinkConfig, SinkType, TrackConfig,
        TrackDirection,
    };
    use lap_timer::{LapError, LapOutcome, LapTimer, LapTimerConfig};
    use scoreboard::ScoreReporter;
    use sim_bridge::{MockCourse, MockSimulator, Simulator, TrackPlanner, VehicleLimits};

    const WAIT: Duration = Duration::from_secs(3);
    const SPEED: f64 = 4.0;
    const LAP_LENGTH: f64 = 4.0;

    async fn trackside() -> MockTrackside {
        MockTrackside::bind_local().await.unwrap()
    }

    fn course(trackside: &MockTrackside) -> MockCourse {
        MockCourse::new(LAP_LENGTH, trackside.crossing_callback())
    }

    fn monitor_config(trackside: &MockTrackside) -> MonitorConfig {
        trackside
            .monitor_config()
            .with_settle_delay(Duration::from_millis(50))
    }

    fn timing(timeout: Duration) -> LapTimerConfig {
        LapTimerConfig {
            timeout,
            tick_interval: Duration::from_millis(5),
        }
    }

    async fn wait_listening(monitor: &CollisionMonitor) -> bool {
        let deadline = Instant::now() + WAIT;
        while !CheckpointId::ALL
            .iter()
            .all(|&cp| monitor.channel_state(cp) == ChannelState::Listening)
        {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Server side stores the stream right after its handshake
        tokio::time::sleep(Duration::from_millis(20)).await;
        true
    }

    /// One attempt: fresh monitor, blocking timer, cruise at `speed`
    async fn attempt(
        config: MonitorConfig,
        timer: LapTimerConfig,
        mut sim: MockSimulator,
        speed: f64,
    ) -> (lap_timer::Result<LapOutcome>, MockSimulator, Arc<CollisionMonitor>) {
        let monitor = Arc::new(CollisionMonitor::start(config).unwrap());
        wait_listening(&monitor).await;

        let source = monitor.clone();
        let (result, sim) = tokio::task::spawn_blocking(move || {
            let timer = LapTimer::new(timer);
            let result = timer.run(source.as_ref(), &mut sim, &mut |s: &mut MockSimulator| {
                let _ = s.set_car_steering(0.0);
                let _ = s.set_car_velocity(speed);
            });
            (result, sim)
        })
        .await
        .unwrap();

        (result, sim, monitor)
    }

    /// End-to-end: both directions timed over real WebSocket listeners,
    /// then reported to a file sink.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_two_direction_run() {
        let trackside = trackside().await;
        let planner = TrackPlanner::new(TrackConfig::default());
        let mut sim = MockSimulator::new(VehicleLimits::default())
            .with_course(course(&trackside))
            .realtime();
        sim.stop().unwrap();
        sim.start().unwrap();

        let mut laps = Vec::new();
        let mut aggregator = observability::LapMetricsAggregator::new();
        for planned in planner.plan() {
            sim.reset_car_pose(&planned.pose).unwrap();
            let (result, sim_back, monitor) = attempt(
                monitor_config(&trackside),
                timing(Duration::from_secs(10)),
                sim,
                SPEED,
            )
            .await;
            sim = sim_back;

            let outcome = result.unwrap();
            let lap_s = outcome.lap_time.as_secs_f64();
            assert!(
                (0.7..2.0).contains(&lap_s),
                "{} lap took {lap_s}s",
                planned.direction
            );
            assert!(monitor.collisions_observed(CheckpointId::StartFinish) >= 2);
            assert!(monitor.collisions_observed(CheckpointId::Mid) >= 1);

            if let Ok(monitor) = Arc::try_unwrap(monitor) {
                monitor.shutdown().await;
            }
            aggregator.record_lap(planned.direction, outcome.lap_time, outcome.polls);
            laps.push(LapRecord::new(planned.direction, outcome.lap_time));
        }
        sim.stop().unwrap();
        trackside.shutdown().await;

        let summary = aggregator.summary();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.lap_seconds.len(), 2);

        let card = ScoreCard::from_laps(laps[0], laps[1]).unwrap();
        assert!(card.forward_laptime > 0.0 && card.backward_laptime > 0.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.jsonl");
        let reporter = ScoreReporter::from_configs(&[
            SinkConfig {
                name: "console".into(),
                sink_type: SinkType::Log,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "archive".into(),
                sink_type: SinkType::File,
                params: HashMap::from([
                    ("path".to_string(), path.display().to_string()),
                    ("team_code".to_string(), "123456789".to_string()),
                ]),
            },
        ])
        .unwrap();
        let summary = reporter.report(&card).await;
        reporter.shutdown().await;

        assert!(summary.all_accepted());
        assert_eq!(summary.accepted_count(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["team_code"], "123456789");
        assert_eq!(line["forward_laptime"], card.forward_laptime);
        assert_eq!(line["backward_laptime"], card.backward_laptime);
    }

    /// A car that never moves times out before the lap starts.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_timeout_without_crossings() {
        let trackside = trackside().await;
        let mut sim = MockSimulator::new(VehicleLimits::default())
            .with_course(course(&trackside))
            .realtime();
        sim.start().unwrap();

        let started = Instant::now();
        let (result, _sim, monitor) = attempt(
            monitor_config(&trackside),
            timing(Duration::from_millis(300)),
            sim,
            0.0,
        )
        .await;

        assert!(matches!(
            result,
            Err(LapError::Timeout {
                lap_started: false,
                mid_passed: false,
                ..
            })
        ));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(monitor.is_closed());
        trackside.shutdown().await;
    }

    /// An unreachable checkpoint aborts the attempt with its fault.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_refused_checkpoint_faults() {
        let start = MockCheckpointServer::bind().await.unwrap();
        let refused = MockCheckpointServer::refused_url().await.unwrap();
        let config = MonitorConfig::new(start.url(), refused);

        let mut sim = MockSimulator::new(VehicleLimits::default());
        sim.start().unwrap();

        let monitor = CollisionMonitor::start(config).unwrap();
        let (result, _sim) = tokio::task::spawn_blocking(move || {
            let timer = LapTimer::new(timing(Duration::from_secs(5)));
            let result = timer.run(&monitor, &mut sim, &mut lap_timer::IdleHook);
            (result, sim)
        })
        .await
        .unwrap();

        match result {
            Err(LapError::Checkpoint(fault)) => {
                assert_eq!(fault.checkpoint, CheckpointId::Mid);
                assert_eq!(fault.kind, FaultKind::ConnectionFailed);
            }
            other => panic!("expected checkpoint fault, got {other:?}"),
        }
        start.stop().await;
    }

    /// Config file values flow into the monitor and timer settings.
    #[test]
    fn test_config_file_drives_components() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[checkpoints]
host = "10.1.2.3"
start_finish_port = 9100
mid_port = 9101
settle_delay_ms = 80
reopen_after_close = true

[timing]
timeout_s = 120
tick_interval_ms = 10

[tracks]
randomize_order = false
"#,
        )
        .unwrap();

        let blueprint = config_loader::ConfigLoader::load_from_path(file.path()).unwrap();

        let monitor = MonitorConfig::from(&blueprint.checkpoints);
        assert_eq!(monitor.endpoint(CheckpointId::StartFinish), "ws://10.1.2.3:9100");
        assert_eq!(monitor.endpoint(CheckpointId::Mid), "ws://10.1.2.3:9101");
        assert_eq!(monitor.settle_delay, Duration::from_millis(80));
        assert!(monitor.reopen_after_close);

        let timer = LapTimerConfig::try_from(&blueprint.timing).unwrap();
        assert_eq!(timer.timeout, Duration::from_secs(120));
        assert_eq!(timer.tick_interval, Duration::from_millis(10));

        let plan = TrackPlanner::new(blueprint.tracks).plan();
        assert_eq!(plan[0].direction, TrackDirection::Forward);
        assert_eq!(plan[1].direction, TrackDirection::Backward);
    }

    /// Timeouts that cannot become a `Duration` are rejected at load.
    #[test]
    fn test_config_rejects_unrepresentable_timeout() {
        for timeout in ["inf", "nan", "1e20"] {
            let result = config_loader::ConfigLoader::load_from_str(
                &format!("[timing]\ntimeout_s = {timeout}\n"),
                config_loader::ConfigFormat::Toml,
            );
            assert!(result.is_err(), "timeout_s = {timeout} accepted");
        }
    }

    /// A poll gap as long as the hold time is rejected at load.
    #[test]
    fn test_config_rejects_slow_polling() {
        let result = config_loader::ConfigLoader::load_from_str(
            "[checkpoints]\nsettle_delay_ms = 50\n[timing]\ntick_interval_ms = 50\n",
            config_loader::ConfigFormat::Toml,
        );
        assert!(result.is_err());
    }
}
