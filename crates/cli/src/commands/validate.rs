//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::JudgeBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    simulator: String,
    start_finish: String,
    mid: String,
    timeout_s: f64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    simulator: format!(
                        "{}:{}",
                        blueprint.simulator.host, blueprint.simulator.port
                    ),
                    start_finish: blueprint
                        .checkpoints
                        .url(contracts::CheckpointId::StartFinish),
                    mid: blueprint.checkpoints.url(contracts::CheckpointId::Mid),
                    timeout_s: blueprint.timing.timeout_s,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &JudgeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - the score will only be printed".to_string());
    }

    if blueprint.timing.tick_interval_ms == 0 {
        warnings.push(
            "timing.tick_interval_ms is 0 - the lap timer polls without sleeping".to_string(),
        );
    }

    if !blueprint.tracks.randomize_order {
        warnings.push(
            "tracks.randomize_order is disabled - the forward direction is always driven first"
                .to_string(),
        );
    }

    if blueprint.checkpoints.reopen_after_close {
        warnings.push(
            "checkpoints.reopen_after_close is enabled - dropped checkpoint streams are not reported"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Simulator: {}", summary.simulator);
            println!("  Start/finish checkpoint: {}", summary.start_finish);
            println!("  Midpoint checkpoint: {}", summary.mid);
            println!("  Timeout: {} s", summary.timeout_s);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_defaults_are_valid_with_warnings() {
        let (_file, args) = args_for("");
        let result = validate_config(&args);

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("No sinks")));
        assert!(warnings.iter().any(|w| w.contains("tick_interval_ms")));
        assert_eq!(result.summary.unwrap().mid, "ws://localhost:9001");
    }

    #[test]
    fn test_same_ports_are_invalid() {
        let (_file, args) = args_for(
            r#"
[checkpoints]
start_finish_port = 9000
mid_port = 9000
"#,
        );
        let result = validate_config(&args);

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("mid_port"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "does/not/exist.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
