//! Publish/subscribe abstraction for client events (mechanics only).
//!
//! The bus is a **fan-out** channel between the sync core and its observers
//! (toast renderer, query cache, log sink):
//!
//! - **Transport-agnostic**: in-memory channels today, an IPC bridge to a
//!   webview tomorrow.
//! - **Best effort**: events are fire-and-forget; a publisher never waits for
//!   an acknowledgement and a dead subscriber never blocks publication.
//! - **No persistence**: nothing on the bus needs to survive a restart. The
//!   queue store is the durable state.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a bus.
///
/// Each subscription receives its own copy of every message published after
/// it was created (broadcast semantics), in publication order.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(event) => render(event),
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
///
/// Subscriptions are meant to be drained by one consumer.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything published so far that has not been received yet.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic pub/sub bus.
///
/// `publish` may fail (e.g. a poisoned lock); callers on the sync path log the
/// failure and move on, since a lost notification must never fail a sync.
///
/// Implementations must be `Send + Sync`: the sync worker publishes from a
/// tokio task while the UI subscribes from its own thread.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
