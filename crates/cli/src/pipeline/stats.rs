//! Simulation statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::DistributionAggregator;

/// Statistics from a simulation run
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// Strategy the dispatcher ran with
    pub strategy: String,

    /// Messages the producer managed to send
    pub messages_sent: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Dispatcher-side counters, returned by the worker on shutdown
    pub dispatch: MetricsSnapshot,

    /// Consumer-side arrivals, latency and ordering
    pub distribution: DistributionAggregator,
}

impl SimulationStats {
    /// Delivered messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.distribution.total() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Messages sent but never received by a consumer
    pub fn lost(&self) -> u64 {
        self.messages_sent.saturating_sub(self.distribution.total())
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Simulation Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Strategy: {}", self.strategy);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages sent: {}", self.messages_sent);
        println!("   ├─ Messages delivered: {}", self.distribution.total());
        println!("   └─ Throughput: {:.2} msg/s", self.throughput());

        println!("\nDispatcher");
        println!("   ├─ Received from source: {}", self.dispatch.received_count);
        println!("   ├─ Dispatched: {}", self.dispatch.dispatched_total());
        println!("   ├─ Undeliverable: {}", self.dispatch.undeliverable_total());
        println!("   └─ Capacity waits: {}", self.dispatch.capacity_waits);

        println!();
        print!("{}", self.distribution.summary());
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_and_lost() {
        let mut distribution = DistributionAggregator::new(2);
        for _ in 0..10 {
            distribution.record(0, 1.0);
        }

        let stats = SimulationStats {
            strategy: "round_robin".to_string(),
            messages_sent: 12,
            duration: Duration::from_secs(2),
            dispatch: MetricsSnapshot::default(),
            distribution,
        };

        assert!((stats.throughput() - 5.0).abs() < 1e-10);
        assert_eq!(stats.lost(), 2);
    }

    #[test]
    fn test_zero_duration_throughput() {
        assert_eq!(SimulationStats::default().throughput(), 0.0);
    }
}
