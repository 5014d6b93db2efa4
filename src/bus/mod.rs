// src/bus/mod.rs

//! Control-plane transport and protocol.
//!
//! The orchestrator does not own a message broker; it talks to an abstract
//! publish/subscribe bus through the [`MessageBus`] trait. Delivery is
//! best-effort: the protocol verbs are idempotent and [`BusSender`] adds
//! bounded retry plus per-destination cool-down, so duplication and loss
//! are tolerated.

pub mod memory;
pub mod protocol;
pub mod sender;

pub use memory::MemoryBus;
pub use protocol::{channel_for, ControlMessage, MASTER_CHANNEL};
pub use sender::BusSender;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::Result;

/// Boxed future type used for trait methods, so implementations stay
/// object-safe without an extra macro dependency.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstract publish/subscribe transport.
///
/// Channels are addressed by uppercase-normalized task names; the master
/// listens on [`MASTER_CHANNEL`]. Implementations must not assume ordering
/// or exactly-once delivery.
pub trait MessageBus: Send + Sync {
    /// Publish a message on the given channel.
    fn publish(&self, channel: &str, message: &str) -> BoxFuture<'_, Result<()>>;

    /// Subscribe to the given channel, returning a stream of raw messages.
    fn subscribe(&self, channel: &str) -> BoxFuture<'_, Result<Subscription>>;
}

/// A live subscription to a single bus channel.
pub struct Subscription {
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Receive the next message; `None` when the channel is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
