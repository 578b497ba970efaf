//! Batch Workers Example
//!
//! Splits a job stream across worker channels with a custom strategy that
//! keeps jobs of the same tenant on the same worker, then lets every worker
//! process its jobs in batches.
//!
//! Run with: cargo run -p fanout_demos --bin batch_workers [config.toml]

use std::time::Duration;

use config_loader::ConfigLoader;
use dispatcher::channel::{buffer_with_timeout, generator};
use dispatcher::{from_fn, ChannelDispatcher, OutputChannel};
use observability::DistributionAggregator;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
struct Job {
    tenant: u32,
    id: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Batch Workers Demo");

    // ==== Stage 1: Use default config or load from file ====
    let (count, cap, jobs) = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading dispatcher config");
        let blueprint = ConfigLoader::load_from_path(std::path::Path::new(&path))?;
        (
            blueprint.dispatcher.count,
            blueprint.dispatcher.channel_buffer_cap,
            blueprint.workload.messages,
        )
    } else {
        (4, 8, 200)
    };

    // ==== Stage 2: Job source ====
    let source = generator(16, move |out| async move {
        for id in 0..jobs {
            let job = Job {
                tenant: (id % 7) as u32,
                id,
            };
            if !out.emit(job).await {
                break;
            }
        }
    });

    // ==== Stage 3: Tenant-affine dispatcher ====
    // Same tenant, same worker: per-tenant order survives the fan-out.
    let by_tenant = from_fn(|job: &Job, _index: u64, outputs: &[OutputChannel<Job>]| {
        Some(job.tenant as usize % outputs.len())
    });
    let dispatcher = ChannelDispatcher::spawn(source, count, cap, by_tenant)?;
    let (outputs, dispatch_task) = dispatcher.into_parts();

    // ==== Stage 4: Batch workers ====
    let workers: Vec<_> = outputs
        .into_iter()
        .map(|mut output| {
            tokio::spawn(async move {
                let index = output.index();
                let (tx, mut rx) = mpsc::channel(cap.max(1));
                tokio::spawn(async move {
                    while let Some(job) = output.recv().await {
                        if tx.send(job).await.is_err() {
                            break;
                        }
                    }
                });

                let mut aggregator = DistributionAggregator::new(count);
                loop {
                    let batch = buffer_with_timeout(&mut rx, 5, Duration::from_millis(20)).await;
                    for job in &batch.items {
                        aggregator.record(index, 0.0);
                        tracing::debug!(worker = index, tenant = job.tenant, id = job.id, "Job done");
                    }
                    if !batch.is_empty() {
                        tracing::info!(worker = index, jobs = batch.len(), "Batch processed");
                    }
                    if !batch.open {
                        break;
                    }
                }
                aggregator
            })
        })
        .collect();

    // ==== Stage 5: Report ====
    let mut total = DistributionAggregator::new(count);
    for worker in workers {
        total.merge(&worker.await?);
    }
    let snapshot = dispatch_task.await?;

    tracing::info!(
        dispatched = snapshot.dispatched_total(),
        capacity_waits = snapshot.capacity_waits,
        "Dispatcher finished"
    );
    println!("{}", total.summary());

    Ok(())
}
