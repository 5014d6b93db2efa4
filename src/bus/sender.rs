// src/bus/sender.rs

//! Outbound side of the control plane: bounded retry per send, plus a
//! per-destination consecutive-failure counter. A destination that keeps
//! failing is put in a cool-down; sends to it are suppressed until the
//! deadline passes, so an unreachable peer cannot provoke a retry storm.
//! A single successful delivery resets the counter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::bus::{channel_for, ControlMessage, MessageBus, MASTER_CHANNEL};
use crate::errors::{Result, TaskmasterError};

/// Immediate retries per `send_to` call before the failure counts.
const TRY_COUNT: u32 = 3;
/// Pause between immediate retries.
const RETRY_DELAY: Duration = Duration::from_millis(500);
/// Consecutive failed sends before a destination is put in cool-down.
const DEFAULT_MAX_FAILURES: u32 = 3;
/// Default cool-down once the failure threshold is crossed.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct PeerState {
    consecutive_failures: u32,
    suppressed_until: Option<Instant>,
}

/// Shared sender handle used by everything that publishes control messages.
pub struct BusSender {
    bus: Arc<dyn MessageBus>,
    peers: Mutex<HashMap<String, PeerState>>,
    max_failures: u32,
    cooldown: Duration,
}

impl BusSender {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self::with_backoff(bus, DEFAULT_MAX_FAILURES, DEFAULT_COOLDOWN)
    }

    /// Construct with explicit backoff tuning (used by tests).
    pub fn with_backoff(bus: Arc<dyn MessageBus>, max_failures: u32, cooldown: Duration) -> Self {
        Self {
            bus,
            peers: Mutex::new(HashMap::new()),
            max_failures,
            cooldown,
        }
    }

    /// Publish a control message to a destination channel.
    ///
    /// Retries up to [`TRY_COUNT`] times within this call; persistent failure
    /// bumps the destination's failure counter and may start a cool-down.
    /// While a destination is cooling down, sends return an error without
    /// touching the bus.
    pub async fn send_to(&self, destination: &str, msg: &ControlMessage) -> Result<()> {
        let destination = channel_for(destination);

        if let Some(until) = self.suppressed_until(&destination) {
            debug!(
                %destination,
                remaining_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                "send suppressed; destination is cooling down"
            );
            return Err(TaskmasterError::BusError(format!(
                "sends to '{destination}' suppressed until cool-down expires"
            )));
        }

        let message = msg.to_string();
        let mut last_err = None;

        for attempt in 1..=TRY_COUNT {
            match self.bus.publish(&destination, &message).await {
                Ok(()) => {
                    debug!(%destination, %message, attempt, "control message sent");
                    self.record_success(&destination);
                    return Ok(());
                }
                Err(err) => {
                    debug!(
                        %destination,
                        %message,
                        attempt,
                        error = %err,
                        "publish failed"
                    );
                    last_err = Some(err);
                    if attempt < TRY_COUNT {
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        self.record_failure(&destination);
        Err(last_err.unwrap_or_else(|| {
            TaskmasterError::BusError(format!("publish to '{destination}' failed"))
        }))
    }

    /// Publish a control message to the master's inbox.
    pub async fn send_to_master(&self, msg: &ControlMessage) -> Result<()> {
        self.send_to(MASTER_CHANNEL, msg).await
    }

    fn suppressed_until(&self, destination: &str) -> Option<Instant> {
        let mut peers = self.peers.lock().unwrap();
        let state = peers.get_mut(destination)?;
        match state.suppressed_until {
            Some(until) if until > Instant::now() => Some(until),
            Some(_) => {
                // Cool-down expired; allow traffic again.
                state.suppressed_until = None;
                None
            }
            None => None,
        }
    }

    fn record_success(&self, destination: &str) {
        let mut peers = self.peers.lock().unwrap();
        if let Some(state) = peers.get_mut(destination) {
            state.consecutive_failures = 0;
            state.suppressed_until = None;
        }
    }

    fn record_failure(&self, destination: &str) {
        let mut peers = self.peers.lock().unwrap();
        let state = peers.entry(destination.to_string()).or_default();
        state.consecutive_failures += 1;

        if state.consecutive_failures >= self.max_failures {
            let until = Instant::now() + self.cooldown;
            state.suppressed_until = Some(until);
            warn!(
                %destination,
                failures = state.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "destination unreachable; suppressing further sends"
            );
        }
    }
}
