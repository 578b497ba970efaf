//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchBlueprint, StrategyConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatcher: DispatcherInfo,
    workload: WorkloadInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<OutputInfo>,
}

#[derive(Serialize)]
struct DispatcherInfo {
    count: usize,
    channel_buffer_cap: usize,
    max_in_flight: usize,
    strategy: String,
    waits_for_capacity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct WorkloadInfo {
    messages: u64,
    source_capacity: usize,
}

#[derive(Serialize)]
struct OutputInfo {
    index: usize,
    consumer_delay_ms: u64,
    /// Expected share of traffic in percent, when the strategy fixes one
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_share: Option<f64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args.outputs);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &DispatchBlueprint, with_outputs: bool) -> ConfigInfo {
    let settings = &blueprint.dispatcher;

    let outputs = if with_outputs {
        (0..settings.count)
            .map(|index| OutputInfo {
                index,
                consumer_delay_ms: blueprint.workload.consumer_delay_ms(index),
                expected_share: expected_share(&settings.strategy, settings.count, index),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        dispatcher: DispatcherInfo {
            count: settings.count,
            channel_buffer_cap: settings.channel_buffer_cap,
            max_in_flight: settings.max_in_flight(),
            strategy: settings.strategy.to_string(),
            waits_for_capacity: settings.strategy.waits_for_capacity(),
            seed: settings.strategy.seed(),
        },
        workload: WorkloadInfo {
            messages: blueprint.workload.messages,
            source_capacity: blueprint.workload.source_capacity,
        },
        outputs,
    }
}

/// Share of traffic output `index` gets while no output is full
fn expected_share(strategy: &StrategyConfig, count: usize, index: usize) -> Option<f64> {
    match strategy {
        StrategyConfig::RoundRobin | StrategyConfig::Random { .. } => Some(100.0 / count as f64),
        StrategyConfig::WeightedRandom { weights, .. } => {
            let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
            let weight = weights.get(index).copied().unwrap_or(0);
            (total > 0).then(|| f64::from(weight) / total as f64 * 100.0)
        }
        StrategyConfig::First | StrategyConfig::Least | StrategyConfig::Most => None,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Fanout Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let d = &info.dispatcher;
    println!("Dispatcher");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Outputs: {}", d.count);
    println!("   ├─ Buffer capacity: {}", d.channel_buffer_cap);
    println!("   ├─ Max in flight: {}", d.max_in_flight);
    match d.seed {
        Some(seed) => {
            println!("   ├─ Strategy: {}", d.strategy);
            println!("   └─ Seed: {}", seed);
        }
        None => println!("   └─ Strategy: {}", d.strategy),
    }

    println!("\nWorkload");
    println!("   ├─ Messages: {}", info.workload.messages);
    println!("   └─ Source capacity: {}", info.workload.source_capacity);

    if !info.outputs.is_empty() {
        println!("\nOutputs ({})", info.outputs.len());
        for (i, output) in info.outputs.iter().enumerate() {
            let prefix = if i == info.outputs.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let share = output
                .expected_share
                .map(|s| format!(", expected {:.1}%", s))
                .unwrap_or_default();
            println!(
                "   {} output {} (delay {} ms{})",
                prefix, output.index, output.consumer_delay_ms, share
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_share_weighted() {
        let strategy = StrategyConfig::WeightedRandom {
            weights: vec![1, 3],
            seed: None,
        };
        assert_eq!(expected_share(&strategy, 2, 0), Some(25.0));
        assert_eq!(expected_share(&strategy, 2, 1), Some(75.0));
        assert_eq!(expected_share(&StrategyConfig::Least, 2, 0), None);
    }

    #[test]
    fn test_build_config_info_outputs() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[dispatcher]
count = 4
channel_buffer_cap = 2

[workload]
consumer_delays_ms = [5]
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&blueprint, true);
        assert_eq!(info.dispatcher.max_in_flight, 8);
        assert_eq!(info.outputs.len(), 4);
        assert_eq!(info.outputs[0].consumer_delay_ms, 5);
        assert_eq!(info.outputs[3].consumer_delay_ms, 0);
        assert_eq!(info.outputs[1].expected_share, Some(25.0));

        assert!(build_config_info(&blueprint, false).outputs.is_empty());
    }
}
