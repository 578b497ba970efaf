//! Output channels - the N fan-out destinations of a dispatcher
//!
//! The dispatcher owns the sending halves ([`OutputChannel`]) and hands the
//! receiving halves ([`OutputReceiver`]) to consumers. A capacity of zero
//! gives a rendezvous channel: a send completes only once the consumer has
//! taken the message.

use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, Notify};

/// A message in flight, with the hand-off acknowledgement for rendezvous outputs
struct Delivery<T> {
    msg: T,
    ack: Option<oneshot::Sender<()>>,
}

/// Create `count` outputs sharing one capacity notifier
pub(crate) fn output_set<T>(
    count: usize,
    capacity: usize,
    space: &Arc<Notify>,
) -> (Vec<OutputChannel<T>>, Vec<OutputReceiver<T>>) {
    let mut senders = Vec::with_capacity(count);
    let mut receivers = Vec::with_capacity(count);

    for index in 0..count {
        // tokio rejects zero-sized buffers; rendezvous outputs hold at most one
        // unacknowledged delivery.
        let (tx, rx) = mpsc::channel(capacity.max(1));
        senders.push(OutputChannel {
            index,
            capacity,
            tx,
        });
        receivers.push(OutputReceiver {
            index,
            capacity,
            rx,
            space: Arc::clone(space),
        });
    }

    (senders, receivers)
}

/// Dispatcher-side handle of one output channel
///
/// Strategies inspect these to make load-aware decisions; all queries are
/// non-blocking.
pub struct OutputChannel<T> {
    index: usize,
    capacity: usize,
    tx: mpsc::Sender<Delivery<T>>,
}

impl<T> OutputChannel<T> {
    /// Position of this output in the dispatcher's output set
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured buffer capacity (0 = unbuffered)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages currently buffered and not yet consumed
    pub fn len(&self) -> usize {
        if self.capacity == 0 {
            0
        } else {
            self.tx.max_capacity() - self.tx.capacity()
        }
    }

    /// Whether no messages are currently buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A bounded output is full when its buffer is at capacity.
    ///
    /// Unbuffered outputs and outputs whose consumer has gone away are never
    /// reported full.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && !self.tx.is_closed() && self.tx.capacity() == 0
    }

    /// Whether the consumer side has been dropped or closed
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether a message sent now would be taken without waiting for space:
    /// the consumer is alive and the buffer has room.
    pub fn accepts(&self) -> bool {
        !self.is_closed() && !self.is_full()
    }

    /// Deliver a message, waiting for buffer space (or for the consumer to
    /// take it on unbuffered outputs).
    ///
    /// Returns `false` if the consumer went away before accepting it.
    pub(crate) async fn send(&self, msg: T) -> bool {
        if self.capacity > 0 {
            return self.tx.send(Delivery { msg, ack: None }).await.is_ok();
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let delivery = Delivery {
            msg,
            ack: Some(ack_tx),
        };
        if self.tx.send(delivery).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }
}

/// Consumer-side handle of one output channel
///
/// Yields `None` from [`recv`](Self::recv) once the dispatcher's source has
/// closed and every message routed here has been consumed.
pub struct OutputReceiver<T> {
    index: usize,
    capacity: usize,
    rx: mpsc::Receiver<Delivery<T>>,
    space: Arc<Notify>,
}

impl<T> OutputReceiver<T> {
    /// Position of this output in the dispatcher's output set
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured buffer capacity (0 = unbuffered)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages waiting to be received
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no messages are waiting
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Whether the dispatcher closed this output
    ///
    /// Buffered messages may still be pending.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Receive the next message
    ///
    /// Cancel-safe: a message is never lost if the future is dropped.
    pub async fn recv(&mut self) -> Option<T> {
        let delivery = self.rx.recv().await?;
        Some(self.accept(delivery))
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let delivery = self.rx.try_recv()?;
        Ok(self.accept(delivery))
    }

    /// Stop accepting messages; already buffered ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
        self.space.notify_waiters();
    }

    fn accept(&self, delivery: Delivery<T>) -> T {
        if let Some(ack) = delivery.ack {
            let _ = ack.send(());
        }
        self.space.notify_waiters();
        delivery.msg
    }
}

impl<T> Drop for OutputReceiver<T> {
    fn drop(&mut self) {
        self.space.notify_waiters();
    }
}

impl<T> std::fmt::Debug for OutputChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputChannel")
            .field("index", &self.index)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> std::fmt::Debug for OutputReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputReceiver")
            .field("index", &self.index)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
