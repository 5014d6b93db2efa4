// src/bus/memory.rs

//! In-process bus implementation backed by tokio mpsc channels.
//!
//! This is the transport used by the master itself and by tests. A
//! deployment that runs workers out of process plugs in a real broker
//! behind the same [`MessageBus`] trait; the endpoint written to the port
//! file is how a spawned worker discovers it.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::bus::{channel_for, BoxFuture, MessageBus, Subscription};
use crate::errors::Result;

/// Buffer size for each subscription channel.
const CHANNEL_CAPACITY: usize = 64;

/// In-memory publish/subscribe bus.
#[derive(Default)]
pub struct MemoryBus {
    channels: Mutex<HashMap<String, Vec<mpsc::Sender<String>>>>,
}

impl MemoryBus {
    /// Endpoint descriptor written to the discoverable port file.
    pub const ENDPOINT: &'static str = "inproc://taskmaster";

    pub fn new() -> Self {
        Self::default()
    }

    fn senders_for(&self, channel: &str) -> Vec<mpsc::Sender<String>> {
        let mut channels = self.channels.lock().unwrap();
        match channels.get_mut(channel) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.clone()
            }
            None => Vec::new(),
        }
    }
}

impl MessageBus for MemoryBus {
    fn publish(&self, channel: &str, message: &str) -> BoxFuture<'_, Result<()>> {
        let channel = channel_for(channel);
        let message = message.to_string();

        Box::pin(async move {
            let senders = self.senders_for(&channel);
            if senders.is_empty() {
                // Best-effort delivery: publishing into the void succeeds.
                trace!(%channel, "no subscribers for published message");
                return Ok(());
            }

            for tx in senders {
                if tx.send(message.clone()).await.is_err() {
                    debug!(%channel, "subscriber went away during publish");
                }
            }
            Ok(())
        })
    }

    fn subscribe(&self, channel: &str) -> BoxFuture<'_, Result<Subscription>> {
        let channel = channel_for(channel);

        Box::pin(async move {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            let mut channels = self.channels.lock().unwrap();
            channels.entry(channel).or_default().push(tx);
            Ok(Subscription::new(rx))
        })
    }
}
