//! ChannelDispatcher - routes one source stream onto N output channels

use std::sync::Arc;

use contracts::DispatcherSettings;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::output::{output_set, OutputChannel, OutputReceiver};
use crate::strategy::{build_strategy, DispatchStrategy};

/// A running dispatcher: its output receivers plus the worker task
///
/// The worker reads the source until it closes, routing every message to
/// exactly one output, then closes all outputs. Dropping this value does not
/// stop the worker; closing the source does.
pub struct ChannelDispatcher<T> {
    outputs: Vec<OutputReceiver<T>>,
    worker: JoinHandle<MetricsSnapshot>,
    metrics: Arc<DispatcherMetrics>,
}

impl<T: Send + 'static> ChannelDispatcher<T> {
    /// Start dispatching `source` onto `count` outputs of `channel_buffer_cap`
    /// capacity each (0 = unbuffered).
    ///
    /// Returns immediately; the routing happens on a spawned tokio task.
    ///
    /// # Errors
    /// - `count` is zero
    /// - called outside a tokio runtime
    pub fn spawn<S>(
        source: mpsc::Receiver<T>,
        count: usize,
        channel_buffer_cap: usize,
        strategy: S,
    ) -> Result<Self, DispatcherError>
    where
        S: DispatchStrategy<T> + 'static,
    {
        if count == 0 {
            return Err(DispatcherError::InvalidCount { count });
        }
        let runtime = Handle::try_current().map_err(|_| DispatcherError::NoRuntime)?;

        let space = Arc::new(Notify::new());
        let (senders, outputs) = output_set(count, channel_buffer_cap, &space);
        let metrics = Arc::new(DispatcherMetrics::new(count));

        let worker = DispatchWorker {
            source,
            outputs: senders,
            strategy,
            space,
            metrics: Arc::clone(&metrics),
        };
        let worker = runtime.spawn(worker.run());

        Ok(Self {
            outputs,
            worker,
            metrics,
        })
    }

    /// Start a dispatcher from configuration
    #[instrument(
        name = "channel_dispatcher_from_settings",
        skip(source, settings),
        fields(
            count = settings.count,
            channel_buffer_cap = settings.channel_buffer_cap,
            strategy = %settings.strategy
        )
    )]
    pub fn from_settings(
        source: mpsc::Receiver<T>,
        settings: &DispatcherSettings,
    ) -> Result<Self, DispatcherError> {
        if settings.count == 0 {
            return Err(DispatcherError::InvalidCount {
                count: settings.count,
            });
        }
        let strategy = build_strategy::<T>(&settings.strategy, settings.count)?;
        Self::spawn(
            source,
            settings.count,
            settings.channel_buffer_cap,
            strategy,
        )
    }
}

impl<T> ChannelDispatcher<T> {
    /// Number of outputs
    pub fn count(&self) -> usize {
        self.outputs.len()
    }

    /// Output receivers, in output order
    pub fn outputs_mut(&mut self) -> &mut [OutputReceiver<T>] {
        &mut self.outputs
    }

    /// Live metrics shared with the worker
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    /// Take the output receivers, leaving the worker detached
    pub fn into_outputs(self) -> Vec<OutputReceiver<T>> {
        self.outputs
    }

    /// Split into output receivers and the worker handle
    ///
    /// The handle resolves to the final metrics once the source has closed
    /// and every output has been closed.
    pub fn into_parts(self) -> (Vec<OutputReceiver<T>>, JoinHandle<MetricsSnapshot>) {
        (self.outputs, self.worker)
    }
}

/// Start a dispatcher and return only its outputs
///
/// Shorthand for [`ChannelDispatcher::spawn`] followed by
/// [`ChannelDispatcher::into_outputs`].
pub fn dispatch_to_channels<T, S>(
    source: mpsc::Receiver<T>,
    count: usize,
    channel_buffer_cap: usize,
    strategy: S,
) -> Result<Vec<OutputReceiver<T>>, DispatcherError>
where
    T: Send + 'static,
    S: DispatchStrategy<T> + 'static,
{
    ChannelDispatcher::spawn(source, count, channel_buffer_cap, strategy)
        .map(ChannelDispatcher::into_outputs)
}

/// State owned by the dispatch task
struct DispatchWorker<T, S> {
    source: mpsc::Receiver<T>,
    outputs: Vec<OutputChannel<T>>,
    strategy: S,
    space: Arc<Notify>,
    metrics: Arc<DispatcherMetrics>,
}

impl<T, S> DispatchWorker<T, S>
where
    T: Send + 'static,
    S: DispatchStrategy<T>,
{
    /// Run the dispatch loop
    ///
    /// Returns when the source is closed, after closing every output.
    #[instrument(name = "channel_dispatcher_run", skip(self), fields(outputs = self.outputs.len()))]
    async fn run(mut self) -> MetricsSnapshot {
        info!(outputs = self.outputs.len(), "Dispatcher started");

        let mut index: u64 = 0;

        while let Some(msg) = self.source.recv().await {
            self.metrics.inc_received_count();
            let (target, msg) = self.select_target(msg, index).await;
            self.deliver(target, msg, index).await;

            index += 1;
            if index.is_multiple_of(1000) {
                debug!(messages = index, "Dispatcher progress");
            }
        }

        info!(messages = index, "Dispatcher source closed, closing outputs");

        // Dropping the senders closes each output exactly once; consumers
        // still drain whatever is buffered.
        self.outputs.clear();

        let snapshot = self.metrics.snapshot();
        info!(
            dispatched = snapshot.dispatched_total(),
            undeliverable = snapshot.undeliverable_total(),
            capacity_waits = snapshot.capacity_waits,
            "Dispatcher shutdown complete"
        );
        snapshot
    }

    /// Ask the strategy for a target, parking while it has none
    ///
    /// The message is moved through so that only `T: Send` is required.
    async fn select_target(&mut self, msg: T, index: u64) -> (usize, T) {
        let count = self.outputs.len();
        loop {
            // Register before asking so a consumer freeing space between the
            // check and the await still wakes us.
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(target) = self.strategy.select(&msg, index, &self.outputs) {
                return (target % count, msg);
            }

            self.metrics.inc_capacity_waits();
            observability::record_capacity_wait();
            debug!(index, "All candidate outputs full, waiting for capacity");
            notified.await;
        }
    }

    async fn deliver(&mut self, target: usize, msg: T, index: u64) {
        let output = &self.outputs[target];
        let output_metrics = self.metrics.output(target);

        if output.send(msg).await {
            let depth = output.len();
            output_metrics.inc_dispatched_count();
            output_metrics.set_queue_len(depth);
            observability::record_message_dispatched(target);
            observability::record_output_depth(target, depth);
        } else {
            output_metrics.inc_undeliverable_count();
            observability::record_message_undeliverable(target);
            warn!(
                output = target,
                index, "Output receiver dropped, message undeliverable"
            );
        }
    }
}
