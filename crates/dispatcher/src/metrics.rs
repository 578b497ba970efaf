//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single output channel
#[derive(Debug, Default)]
pub struct OutputMetrics {
    /// Buffered messages right after the last send
    queue_len: AtomicUsize,
    /// Messages handed to this output
    dispatched_count: AtomicU64,
    /// Messages routed here after the consumer went away
    undeliverable_count: AtomicU64,
}

impl OutputMetrics {
    /// Get last observed queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set last observed queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get dispatched count
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    /// Increment dispatched count
    pub fn inc_dispatched_count(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get undeliverable count
    pub fn undeliverable_count(&self) -> u64 {
        self.undeliverable_count.load(Ordering::Relaxed)
    }

    /// Increment undeliverable count
    pub fn inc_undeliverable_count(&self) {
        self.undeliverable_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of this output's metrics
    pub fn snapshot(&self) -> OutputSnapshot {
        OutputSnapshot {
            queue_len: self.queue_len(),
            dispatched_count: self.dispatched_count(),
            undeliverable_count: self.undeliverable_count(),
        }
    }
}

/// Metrics shared between a dispatcher worker and its owner
#[derive(Debug)]
pub struct DispatcherMetrics {
    /// Per-output metrics, indexed like the outputs
    outputs: Vec<OutputMetrics>,
    /// Messages read from the source
    received_count: AtomicU64,
    /// Times the strategy found no acceptable output and the worker parked
    capacity_waits: AtomicU64,
}

impl DispatcherMetrics {
    /// Create metrics for `count` outputs
    pub fn new(count: usize) -> Self {
        Self {
            outputs: (0..count).map(|_| OutputMetrics::default()).collect(),
            received_count: AtomicU64::new(0),
            capacity_waits: AtomicU64::new(0),
        }
    }

    /// Metrics of output `index`
    pub fn output(&self, index: usize) -> &OutputMetrics {
        &self.outputs[index]
    }

    /// Get received count
    pub fn received_count(&self) -> u64 {
        self.received_count.load(Ordering::Relaxed)
    }

    /// Increment received count
    pub fn inc_received_count(&self) {
        self.received_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get capacity wait count
    pub fn capacity_waits(&self) -> u64 {
        self.capacity_waits.load(Ordering::Relaxed)
    }

    /// Increment capacity wait count
    pub fn inc_capacity_waits(&self) {
        self.capacity_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received_count: self.received_count(),
            capacity_waits: self.capacity_waits(),
            outputs: self.outputs.iter().map(OutputMetrics::snapshot).collect(),
        }
    }
}

/// Snapshot of one output's metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    pub queue_len: usize,
    pub dispatched_count: u64,
    pub undeliverable_count: u64,
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received_count: u64,
    pub capacity_waits: u64,
    pub outputs: Vec<OutputSnapshot>,
}

impl MetricsSnapshot {
    /// Messages delivered to some output
    pub fn dispatched_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.dispatched_count).sum()
    }

    /// Messages lost to dropped consumers
    pub fn undeliverable_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.undeliverable_count).sum()
    }

    /// Dispatched count per output, in output order
    pub fn distribution(&self) -> Vec<u64> {
        self.outputs.iter().map(|o| o.dispatched_count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_totals() {
        let metrics = DispatcherMetrics::new(3);
        metrics.inc_received_count();
        metrics.inc_received_count();
        metrics.inc_received_count();
        metrics.output(0).inc_dispatched_count();
        metrics.output(2).inc_dispatched_count();
        metrics.output(1).inc_undeliverable_count();
        metrics.output(2).set_queue_len(4);
        metrics.inc_capacity_waits();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received_count, 3);
        assert_eq!(snapshot.capacity_waits, 1);
        assert_eq!(snapshot.dispatched_total(), 2);
        assert_eq!(snapshot.undeliverable_total(), 1);
        assert_eq!(snapshot.distribution(), vec![1, 0, 1]);
        assert_eq!(snapshot.outputs[2].queue_len, 4);
    }
}
