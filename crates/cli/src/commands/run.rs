//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Simulation, SimulationConfig};

/// Execute the `run` command
pub async fn run_simulation(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(messages) = args.messages {
        info!(messages, "Overriding message count from CLI");
        blueprint.workload.messages = messages;
    }
    if let Some(count) = args.count {
        info!(count, "Overriding output count from CLI");
        blueprint.dispatcher.count = count;
    }
    if let Some(cap) = args.buffer_cap {
        info!(channel_buffer_cap = cap, "Overriding buffer capacity from CLI");
        blueprint.dispatcher.channel_buffer_cap = cap;
    }
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        count = blueprint.dispatcher.count,
        channel_buffer_cap = blueprint.dispatcher.channel_buffer_cap,
        strategy = %blueprint.dispatcher.strategy,
        messages = blueprint.workload.messages,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let config = SimulationConfig {
        blueprint,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    let simulation = Simulation::new(config);
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting simulation...");

    tokio::select! {
        result = simulation.run() => {
            let stats = result.context("Simulation failed")?;
            info!(
                delivered = stats.distribution.total(),
                undeliverable = stats.dispatch.undeliverable_total(),
                duration_secs = stats.duration.as_secs_f64(),
                throughput = format!("{:.2}", stats.throughput()),
                "Simulation completed successfully"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping simulation...");
        }
    }

    info!("fanout finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed that branch never resolves.
async fn setup_shutdown_signal() {
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
fn print_config_summary(blueprint: &contracts::DispatchBlueprint) {
    let settings = &blueprint.dispatcher;
    let workload = &blueprint.workload;

    println!("\n=== Configuration Summary ===\n");
    println!("Dispatcher:");
    println!("  Outputs: {}", settings.count);
    println!("  Buffer capacity: {}", settings.channel_buffer_cap);
    println!("  Strategy: {}", settings.strategy);
    if let Some(seed) = settings.strategy.seed() {
        println!("  Seed: {}", seed);
    }
    println!("  Max in flight: {}", settings.max_in_flight());

    println!("\nWorkload:");
    println!("  Messages: {}", workload.messages);
    println!("  Source capacity: {}", workload.source_capacity);
    if !workload.consumer_delays_ms.is_empty() {
        println!("  Consumer delays (ms): {:?}", workload.consumer_delays_ms);
    }

    println!();
}
