//! Channel helpers around `tokio::sync::mpsc`
//!
//! Small building blocks for feeding and draining dispatchers: turning
//! collections into channels and back, generators, batching reads, merging
//! and broadcasting.
//!
//! tokio channels need a non-zero buffer, so a `buffer` of 0 is treated as 1.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

/// Send every item of `items` on a new channel, then close it
pub fn slice_to_channel<T, I>(buffer: usize, items: I) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let items = items.into_iter();

    tokio::spawn(async move {
        for item in items {
            if tx.send(item).await.is_err() {
                trace!("slice_to_channel receiver dropped");
                break;
            }
        }
    });

    rx
}

/// Collect every message until the channel closes
pub async fn channel_to_vec<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Some(item) = rx.recv().await {
        items.push(item);
    }
    items
}

/// Handle passed to a [`generator`] body for emitting values
#[derive(Debug)]
pub struct Emitter<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Emitter<T> {
    /// Emit one value, waiting for buffer space.
    ///
    /// Returns `false` once the consumer has gone away.
    pub async fn emit(&self, item: T) -> bool {
        self.tx.send(item).await.is_ok()
    }
}

/// Run `body` on a task and stream whatever it emits
///
/// The channel closes when `body` returns.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use dispatcher::channel::{channel_to_vec, generator};
///
/// let rx = generator(4, |out| async move {
///     for i in 0..3 {
///         out.emit(i).await;
///     }
/// });
/// assert_eq!(channel_to_vec(rx).await, vec![0, 1, 2]);
/// # }
/// ```
pub fn generator<T, F, Fut>(buffer: usize, body: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce(Emitter<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(body(Emitter { tx }));
    rx
}

/// Result of a batched read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// Items read, at most the requested size
    pub items: Vec<T>,
    /// Time spent reading
    pub read_time: Duration,
    /// `false` once the channel was found closed
    pub open: bool,
}

impl<T> Batch<T> {
    /// Number of items read
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was read
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read up to `size` items, stopping early if the channel closes
pub async fn buffer<T>(rx: &mut mpsc::Receiver<T>, size: usize) -> Batch<T> {
    let start = Instant::now();
    let mut items = Vec::with_capacity(size);

    while items.len() < size {
        match rx.recv().await {
            Some(item) => items.push(item),
            None => {
                return Batch {
                    items,
                    read_time: start.elapsed(),
                    open: false,
                }
            }
        }
    }

    Batch {
        items,
        read_time: start.elapsed(),
        open: true,
    }
}

/// Read up to `size` items, stopping early on close or once `timeout` elapses
pub async fn buffer_with_timeout<T>(
    rx: &mut mpsc::Receiver<T>,
    size: usize,
    timeout: Duration,
) -> Batch<T> {
    let start = Instant::now();
    let deadline = tokio::time::sleep_until(start + timeout);
    tokio::pin!(deadline);
    let mut items = Vec::with_capacity(size);

    while items.len() < size {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(item) => items.push(item),
                None => {
                    return Batch {
                        items,
                        read_time: start.elapsed(),
                        open: false,
                    }
                }
            },
            _ = &mut deadline => break,
        }
    }

    Batch {
        items,
        read_time: start.elapsed(),
        open: true,
    }
}

/// Merge several channels into one
///
/// Per-upstream order is kept; the merged channel closes after every
/// upstream has closed.
pub fn fan_in<T>(buffer: usize, upstreams: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    for mut upstream in upstreams {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(item) = upstream.recv().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
    }

    rx
}

/// Broadcast every message of `upstream` to `count` new channels
///
/// A slow downstream holds back all others. Downstreams that are dropped stop
/// receiving; the rest keep going. All close when `upstream` closes, and
/// `upstream` is released as soon as every downstream has been dropped.
pub fn fan_out<T>(
    count: usize,
    buffer: usize,
    mut upstream: mpsc::Receiver<T>,
) -> Vec<mpsc::Receiver<T>>
where
    T: Clone + Send + 'static,
{
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..count).map(|_| mpsc::channel(buffer.max(1))).unzip();

    tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                item = upstream.recv() => item,
                () = all_closed(&senders) => {
                    trace!("fan_out downstreams all dropped");
                    break;
                }
            };
            let Some(item) = item else { break };

            for tx in senders.iter().filter(|tx| !tx.is_closed()) {
                let _ = tx.send(item.clone()).await;
            }
        }
    });

    receivers
}

/// Resolves once every sender's receiver is gone
async fn all_closed<T>(senders: &[mpsc::Sender<T>]) {
    for tx in senders {
        tx.closed().await;
    }
}
