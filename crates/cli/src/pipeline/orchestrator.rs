//! Simulation orchestrator - wires producer, dispatcher and consumers.
//!
//! One producer task feeds the source channel, the dispatcher routes each
//! message to an output, and one consumer task per output drains it with the
//! configured processing delay.

use std::time::{Duration, Instant};

use contracts::DispatchBlueprint;
use dispatcher::{ChannelDispatcher, OutputReceiver};
use observability::DistributionAggregator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SimulationStats;
use crate::error::{CliError, Result};

/// A synthetic message travelling through the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct WorkItem {
    /// Position in the source stream
    pub seq: u64,
    /// When the producer created it
    pub produced_at: Instant,
}

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Dispatcher and workload configuration
    pub blueprint: DispatchBlueprint,

    /// Simulation timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Runs one dispatcher against a synthetic workload
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    /// Create a new simulation with the given configuration
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Run the simulation to completion
    pub async fn run(self) -> Result<SimulationStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.drive(start_time)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Simulation timed out");
                    Err(CliError::Timeout {
                        secs: timeout.as_secs(),
                    })
                }
            },
            None => self.drive(start_time).await,
        }
    }

    async fn drive(&self, start_time: Instant) -> Result<SimulationStats> {
        let blueprint = &self.config.blueprint;
        let settings = &blueprint.dispatcher;
        let workload = &blueprint.workload;

        let (source_tx, source_rx) = mpsc::channel(workload.source_capacity.max(1));
        let dispatcher = ChannelDispatcher::from_settings(source_rx, settings)?;
        let (outputs, worker) = dispatcher.into_parts();

        info!(
            outputs = outputs.len(),
            strategy = %settings.strategy,
            "Dispatcher started"
        );

        let consumers: Vec<JoinHandle<DistributionAggregator>> = outputs
            .into_iter()
            .map(|output| {
                let delay = Duration::from_millis(workload.consumer_delay_ms(output.index()));
                tokio::spawn(consume(output, delay, settings.count))
            })
            .collect();

        let producer = tokio::spawn(produce(source_tx, workload.messages));

        let messages_sent = producer
            .await
            .map_err(|e| CliError::task("producer", e))?;
        info!(messages_sent, "Producer finished");

        // The worker closes every output once the source is drained
        let dispatch = worker.await.map_err(|e| CliError::task("dispatcher", e))?;

        let mut distribution = DistributionAggregator::new(settings.count);
        for (index, consumer) in consumers.into_iter().enumerate() {
            let aggregator = consumer
                .await
                .map_err(|e| CliError::task(format!("consumer-{}", index), e))?;
            distribution.merge(&aggregator);
        }

        let stats = SimulationStats {
            strategy: settings.strategy.to_string(),
            messages_sent,
            duration: start_time.elapsed(),
            dispatch,
            distribution,
        };

        if stats.lost() > 0 {
            warn!(lost = stats.lost(), "Some messages never reached a consumer");
        }

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            throughput = format!("{:.2}", stats.throughput()),
            "Simulation shutdown complete"
        );

        Ok(stats)
    }
}

/// Send `messages` work items, then close the source
async fn produce(tx: mpsc::Sender<WorkItem>, messages: u64) -> u64 {
    let mut sent = 0;
    for seq in 0..messages {
        let item = WorkItem {
            seq,
            produced_at: Instant::now(),
        };
        if tx.send(item).await.is_err() {
            warn!(seq, "Source channel closed early");
            break;
        }
        sent += 1;
    }
    sent
}

/// Drain one output, recording arrivals and ordering
async fn consume(
    mut output: OutputReceiver<WorkItem>,
    delay: Duration,
    outputs: usize,
) -> DistributionAggregator {
    let index = output.index();
    let mut aggregator = DistributionAggregator::new(outputs);
    let mut last_seq: Option<u64> = None;

    while let Some(item) = output.recv().await {
        if last_seq.is_some_and(|prev| item.seq <= prev) {
            warn!(output = index, seq = item.seq, "Out-of-order message");
            aggregator.record_order_violation(index);
        }
        last_seq = Some(item.seq);

        let latency_ms = item.produced_at.elapsed().as_secs_f64() * 1000.0;
        aggregator.record(index, latency_ms);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    debug!(
        output = index,
        received = aggregator.total(),
        "Consumer finished"
    );
    aggregator
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    fn blueprint(content: &str) -> DispatchBlueprint {
        ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap()
    }

    fn simulation(content: &str) -> Simulation {
        Simulation::new(SimulationConfig {
            blueprint: blueprint(content),
            timeout: Some(Duration::from_secs(10)),
            metrics_port: None,
        })
    }

    #[tokio::test]
    async fn test_round_robin_even_distribution() {
        let stats = simulation(
            r#"
[dispatcher]
count = 4
channel_buffer_cap = 128

[workload]
messages = 400
"#,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.messages_sent, 400);
        assert_eq!(stats.distribution.total(), 400);
        assert_eq!(stats.lost(), 0);
        assert_eq!(stats.dispatch.dispatched_total(), 400);
        assert_eq!(stats.distribution.summary().order_violations, 0);
        for received in &stats.distribution.received {
            assert_eq!(*received, 100);
        }
    }

    #[tokio::test]
    async fn test_unbuffered_weighted_simulation() {
        let stats = simulation(
            r#"
[dispatcher]
count = 3
channel_buffer_cap = 0

[dispatcher.strategy]
kind = "weighted_random"
weights = [1, 0, 1]
seed = 7

[workload]
messages = 90
source_capacity = 4
"#,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.distribution.total(), 90);
        assert_eq!(stats.distribution.received[1], 0);
        assert_eq!(stats.strategy, "weighted_random");
    }

    #[tokio::test]
    async fn test_slow_consumer_gets_less_with_least_loaded() {
        let stats = simulation(
            r#"
[dispatcher]
count = 2
channel_buffer_cap = 2

[dispatcher.strategy]
kind = "least"

[workload]
messages = 60
consumer_delays_ms = [5, 0]
"#,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.distribution.total(), 60);
        assert!(stats.distribution.received[1] > stats.distribution.received[0]);
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let mut sim = simulation(
            r#"
[dispatcher]
count = 1
channel_buffer_cap = 1

[workload]
messages = 1000
consumer_delays_ms = [50]
"#,
        );
        sim.config.timeout = Some(Duration::from_millis(50));

        let result = sim.run().await;
        assert!(matches!(result, Err(CliError::Timeout { .. })));
    }
}
