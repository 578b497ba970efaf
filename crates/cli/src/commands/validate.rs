//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchBlueprint, StrategyConfig};
use serde::Serialize;
use std::path::Path;
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
    count: usize,
    channel_buffer_cap: usize,
    strategy: String,
    messages: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(&args.config);

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

fn validate_config(path: &Path) -> ValidationResult {
    let config_path = path.display().to_string();

    if !path.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", path.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(path) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    count: blueprint.dispatcher.count,
                    channel_buffer_cap: blueprint.dispatcher.channel_buffer_cap,
                    strategy: blueprint.dispatcher.strategy.to_string(),
                    messages: blueprint.workload.messages,
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
fn collect_warnings(blueprint: &DispatchBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let settings = &blueprint.dispatcher;

    if blueprint.workload.messages == 0 {
        warnings.push("workload.messages is 0 - nothing will be dispatched".to_string());
    }

    // Unbuffered outputs always report zero load
    if settings.channel_buffer_cap == 0
        && matches!(settings.strategy, StrategyConfig::Least | StrategyConfig::Most)
    {
        warnings.push(format!(
            "strategy '{}' sees no load on unbuffered outputs - every message goes to output 0",
            settings.strategy
        ));
    }

    if let StrategyConfig::WeightedRandom { weights, .. } = &settings.strategy {
        for (i, _) in weights.iter().enumerate().filter(|(_, w)| **w == 0) {
            warnings.push(format!("output {} has weight 0 and will never be selected", i));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Outputs: {}", summary.count);
            println!("  Buffer capacity: {}", summary.channel_buffer_cap);
            println!("  Strategy: {}", summary.strategy);
            println!("  Messages: {}", summary.messages);
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
