//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Lap Judge - checkpoint-based lap timing for the autonomous racing simulator
#[derive(Parser, Debug)]
#[command(
    name = "lap-judge",
    author,
    version,
    about = "Times one lap per track direction and reports the score",
    long_about = "Judges an autonomous driving solution in the racing simulator.\n\n\
                  Places the car at a random track direction, times one lap using the \n\
                  start/finish and midpoint checkpoint collision streams, repeats for the \n\
                  opposite direction, and reports both lap times to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LAP_JUDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LAP_JUDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a judging session (one lap per direction)
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "lap_judge.toml", env = "LAP_JUDGE_CONFIG")]
    pub config: PathBuf,

    /// Override simulator host from configuration
    #[arg(long, env = "LAP_JUDGE_SIM_HOST")]
    pub sim_host: Option<String>,

    /// Override simulator port from configuration
    #[arg(long, env = "LAP_JUDGE_SIM_PORT")]
    pub sim_port: Option<u16>,

    /// Override checkpoint host from configuration
    #[arg(long, env = "LAP_JUDGE_CHECKPOINT_HOST")]
    pub checkpoint_host: Option<String>,

    /// Override start/finish checkpoint port
    #[arg(long, env = "LAP_JUDGE_START_FINISH_PORT")]
    pub start_finish_port: Option<u16>,

    /// Override midpoint checkpoint port
    #[arg(long, env = "LAP_JUDGE_MID_PORT")]
    pub mid_port: Option<u16>,

    /// Override per-attempt timeout in seconds
    #[arg(long, env = "LAP_JUDGE_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Do not submit the score to any sink
    #[arg(long)]
    pub no_submit: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Save the last camera frame of each attempt as PNG into this directory
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LAP_JUDGE_METRICS_PORT")]
    pub metrics_port: u16,

    /// Length of one lap on the mock course (m)
    #[arg(long, default_value = "20.0")]
    pub lap_length: f64,

    /// Constant speed of the built-in cruise policy (m/s)
    #[arg(long, default_value = "2.0")]
    pub cruise_speed: f64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "lap_judge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "lap_judge.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "lap-judge",
            "-v",
            "run",
            "--config",
            "judge.toml",
            "--mid-port",
            "9101",
            "--timeout",
            "120",
            "--no-submit",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("judge.toml"));
        assert_eq!(args.mid_port, Some(9101));
        assert_eq!(args.timeout, Some(120.0));
        assert!(args.no_submit);
        assert_eq!(args.metrics_port, 0);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["lap-judge", "-q", "-v", "validate"]).is_err());
    }
}
