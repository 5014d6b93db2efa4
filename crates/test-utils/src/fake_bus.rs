use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use taskmaster::bus::{BoxFuture, MemoryBus, MessageBus, Subscription};
use taskmaster::errors::{Result, TaskmasterError};

/// A bus that records every published `(channel, message)` pair while
/// delegating real delivery to an in-process bus.
pub struct RecordingBus {
    inner: MemoryBus,
    published: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self {
            inner: MemoryBus::new(),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of everything published so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Messages published on one channel.
    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(ch, _)| ch == channel)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for RecordingBus {
    fn publish(&self, channel: &str, message: &str) -> BoxFuture<'_, Result<()>> {
        let channel = channel.to_string();
        let message = message.to_string();
        Box::pin(async move {
            self.published
                .lock()
                .unwrap()
                .push((channel.clone(), message.clone()));
            self.inner.publish(&channel, &message).await
        })
    }

    fn subscribe(&self, channel: &str) -> BoxFuture<'_, Result<Subscription>> {
        self.inner.subscribe(channel)
    }
}

/// A bus whose first `fail_count` publishes fail, after which it delivers
/// normally. Used to exercise send retry and cool-down behaviour.
pub struct FlakyBus {
    inner: MemoryBus,
    remaining_failures: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyBus {
    pub fn new(fail_count: u32) -> Self {
        Self {
            inner: MemoryBus::new(),
            remaining_failures: AtomicU32::new(fail_count),
            attempts: AtomicU32::new(0),
        }
    }

    /// Total publish attempts observed, including the failed ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Re-arm the bus to fail the next `fail_count` publishes.
    pub fn rearm(&self, fail_count: u32) {
        self.remaining_failures.store(fail_count, Ordering::SeqCst);
    }
}

impl MessageBus for FlakyBus {
    fn publish(&self, channel: &str, message: &str) -> BoxFuture<'_, Result<()>> {
        let channel = channel.to_string();
        let message = message.to_string();
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let failing = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(TaskmasterError::BusError(format!(
                    "injected publish failure on '{channel}'"
                )));
            }

            self.inner.publish(&channel, &message).await
        })
    }

    fn subscribe(&self, channel: &str) -> BoxFuture<'_, Result<Subscription>> {
        self.inner.subscribe(channel)
    }
}
