//! `run` command implementation.

use anyhow::{Context, Result};
use collision::MockTrackside;
use contracts::JudgeBlueprint;
use sim_bridge::{MockCourse, MockSimulator, VehicleLimits};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{CruisePolicy, JudgeConfig, JudgeRun, RunOutcome};

/// Execute the `run` command
pub async fn run_judge(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        simulator = %format!("{}:{}", blueprint.simulator.host, blueprint.simulator.port),
        start_finish = %blueprint.checkpoints.url(contracts::CheckpointId::StartFinish),
        mid = %blueprint.checkpoints.url(contracts::CheckpointId::Mid),
        timeout_s = blueprint.timing.timeout_s,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let trackside = MockTrackside::bind(&blueprint.checkpoints)
        .await
        .context("Failed to start mock checkpoints")?;
    let sim = MockSimulator::new(VehicleLimits::from(&blueprint.vehicle))
        .with_course(MockCourse::new(args.lap_length, trackside.crossing_callback()))
        .realtime();
    let policy = CruisePolicy::new(args.cruise_speed);

    let config = JudgeConfig {
        blueprint,
        submit: !args.no_submit,
        snapshot_dir: args.snapshot.clone(),
    };

    let interrupt = CancellationToken::new();
    let signal_task = tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping judging run...");
            interrupt.cancel();
        }
    });

    info!("Starting judging run...");
    let result = JudgeRun::new(config, sim, policy).run(interrupt).await;

    signal_task.abort();
    trackside.shutdown().await;

    let stats = result.context("Judging run failed")?;
    stats.print_summary();

    match stats.outcome {
        RunOutcome::Scored => {
            if let Some(card) = &stats.score {
                info!(
                    forward_laptime = card.forward_laptime,
                    backward_laptime = card.backward_laptime,
                    "Judging run completed"
                );
            }
        }
        RunOutcome::Aborted { direction, reason } => {
            return Err(CliError::attempt_aborted(direction, reason).into());
        }
        RunOutcome::Interrupted => warn!("Judging run interrupted, no score reported"),
    }

    info!("Lap Judge finished");
    Ok(())
}

/// Apply command-line overrides to the loaded configuration
fn apply_overrides(blueprint: &mut JudgeBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.sim_host {
        info!(host = %host, "Overriding simulator host from CLI");
        blueprint.simulator.host = host.clone();
    }
    if let Some(port) = args.sim_port {
        info!(port, "Overriding simulator port from CLI");
        blueprint.simulator.port = port;
    }
    if let Some(ref host) = args.checkpoint_host {
        info!(host = %host, "Overriding checkpoint host from CLI");
        blueprint.checkpoints.host = host.clone();
    }
    if let Some(port) = args.start_finish_port {
        info!(port, "Overriding start/finish checkpoint port from CLI");
        blueprint.checkpoints.start_finish_port = port;
    }
    if let Some(port) = args.mid_port {
        info!(port, "Overriding midpoint checkpoint port from CLI");
        blueprint.checkpoints.mid_port = port;
    }
    if let Some(timeout) = args.timeout {
        info!(timeout_s = timeout, "Overriding attempt timeout from CLI");
        blueprint.timing.timeout_s = timeout;
    }
}

/// Wait for Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &JudgeBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!(
        "Simulator: {}:{}",
        blueprint.simulator.host, blueprint.simulator.port
    );
    println!("\nCheckpoints:");
    for checkpoint in contracts::CheckpointId::ALL {
        println!("  {}: {}", checkpoint, blueprint.checkpoints.url(checkpoint));
    }
    println!("  Settle delay: {} ms", blueprint.checkpoints.settle_delay_ms);

    println!("\nTiming:");
    println!("  Timeout: {} s", blueprint.timing.timeout_s);
    println!("  Tick interval: {} ms", blueprint.timing.tick_interval_ms);
    println!(
        "  Direction order: {}",
        if blueprint.tracks.randomize_order {
            "random"
        } else {
            "forward first"
        }
    );

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["lap-judge", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let mut blueprint = JudgeBlueprint::default();
        let args = run_args(&["--checkpoint-host", "10.0.0.7", "--mid-port", "9101"]);

        apply_overrides(&mut blueprint, &args);

        assert_eq!(blueprint.checkpoints.host, "10.0.0.7");
        assert_eq!(blueprint.checkpoints.mid_port, 9101);
        assert_eq!(
            blueprint.checkpoints.start_finish_port,
            JudgeBlueprint::default().checkpoints.start_finish_port
        );
        assert_eq!(blueprint.simulator.host, JudgeBlueprint::default().simulator.host);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let mut blueprint = JudgeBlueprint::default();
        let args = run_args(&["--timeout", "0"]);

        apply_overrides(&mut blueprint, &args);

        assert!(config_loader::ConfigLoader::validate(&blueprint).is_err());
    }

    #[tokio::test]
    async fn test_missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let args = run_args(&["--config", dir.path().join("absent.toml").to_str().unwrap()]);

        let err = run_judge(&args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ConfigNotFound { .. })
        ));
    }
}
