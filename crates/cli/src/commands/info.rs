//! `info` command implementation.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use contracts::{CheckpointId, JudgeBlueprint, Pose, TrackDirection};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    simulator: SimulatorInfo,
    checkpoints: CheckpointInfo,
    timing: TimingInfo,
    tracks: Vec<TrackInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SimulatorInfo {
    host: String,
    port: u16,
}

#[derive(Serialize)]
struct CheckpointInfo {
    start_finish: String,
    mid: String,
    settle_delay_ms: u64,
    reopen_after_close: bool,
}

#[derive(Serialize)]
struct TimingInfo {
    timeout_s: f64,
    tick_interval_ms: u64,
}

#[derive(Serialize)]
struct TrackInfo {
    direction: String,
    position: [f64; 3],
    yaw_degrees: f64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    /// Parameter names only; values may hold team codes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn track_info(direction: TrackDirection, pose: &Pose) -> TrackInfo {
    TrackInfo {
        direction: direction.to_string(),
        position: pose.position,
        yaw_degrees: pose.orientation[2].to_degrees(),
    }
}

fn build_config_info(blueprint: &JudgeBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                params: s.params.keys().cloned().collect::<BTreeSet<_>>().into_iter().collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        simulator: SimulatorInfo {
            host: blueprint.simulator.host.clone(),
            port: blueprint.simulator.port,
        },
        checkpoints: CheckpointInfo {
            start_finish: blueprint.checkpoints.url(CheckpointId::StartFinish),
            mid: blueprint.checkpoints.url(CheckpointId::Mid),
            settle_delay_ms: blueprint.checkpoints.settle_delay_ms,
            reopen_after_close: blueprint.checkpoints.reopen_after_close,
        },
        timing: TimingInfo {
            timeout_s: blueprint.timing.timeout_s,
            tick_interval_ms: blueprint.timing.tick_interval_ms,
        },
        tracks: [TrackDirection::Forward, TrackDirection::Backward]
            .into_iter()
            .map(|d| track_info(d, &blueprint.tracks.pose(d)))
            .collect(),
        sinks,
    }
}

fn print_config_info(blueprint: &JudgeBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Lap Judge Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🖥  Simulator");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!(
        "   └─ Remote API: {}:{}",
        blueprint.simulator.host, blueprint.simulator.port
    );

    let checkpoints = &blueprint.checkpoints;
    println!("\n🚩 Checkpoints");
    for checkpoint in CheckpointId::ALL {
        println!("   ├─ {}: {}", checkpoint, checkpoints.url(checkpoint));
    }
    println!("   ├─ Settle delay: {} ms", checkpoints.settle_delay_ms);
    println!(
        "   └─ Reopen after close: {}",
        if checkpoints.reopen_after_close { "yes" } else { "no" }
    );

    println!("\n⏱  Timing");
    println!("   ├─ Timeout: {} s", blueprint.timing.timeout_s);
    println!("   └─ Tick interval: {} ms", blueprint.timing.tick_interval_ms);

    println!("\n🛣  Tracks");
    for direction in [TrackDirection::Forward, TrackDirection::Backward] {
        let track = track_info(direction, &blueprint.tracks.pose(direction));
        println!(
            "   ├─ {}: ({:.2}, {:.2}, {:.2}) yaw {:.1}°",
            track.direction,
            track.position[0],
            track.position[1],
            track.position[2],
            track.yaw_degrees
        );
    }
    println!(
        "   └─ Order: {}",
        if blueprint.tracks.randomize_order {
            "random"
        } else {
            "forward first"
        }
    );

    let vehicle = &blueprint.vehicle;
    println!("\n🚗 Vehicle");
    println!("   ├─ Max velocity: {} m/s", vehicle.max_velocity);
    println!(
        "   ├─ Max steering: {:.1}°",
        vehicle.max_steer_angle.to_degrees()
    );
    println!("   └─ Wheel radius: {} m", vehicle.wheel_radius);

    println!("\n📤 Sinks ({})", blueprint.sinks.len());
    if args.sinks {
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i + 1 == blueprint.sinks.len() { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::collections::HashMap;

    #[test]
    fn test_sink_params_hide_values() {
        let blueprint = JudgeBlueprint {
            sinks: vec![SinkConfig {
                name: "leaderboard".into(),
                sink_type: SinkType::Http,
                params: HashMap::from([
                    ("team_code".to_string(), "123456789".to_string()),
                    ("endpoint".to_string(), "http://board/submit".to_string()),
                ]),
            }],
            ..Default::default()
        };
        let args = InfoArgs {
            config: "judge.toml".into(),
            json: true,
            sinks: true,
        };

        let info = build_config_info(&blueprint, &args);
        let json = serde_json::to_string(&info).unwrap();

        assert_eq!(info.sinks[0].params, vec!["endpoint", "team_code"]);
        assert!(!json.contains("123456789"));
        assert_eq!(info.tracks.len(), 2);
        assert_eq!(info.checkpoints.start_finish, "ws://localhost:9000");
    }
}
