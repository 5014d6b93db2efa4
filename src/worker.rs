// src/worker.rs

//! Worker-side agent.
//!
//! A worker process (or an in-process worker in tests) connects to the bus
//! under its task name, announces itself as launched, answers status
//! queries, and confirms its own stop. What the worker actually *does* is
//! a [`WorkerBody`]; the agent runs the body and converts panics into a
//! normal stop with the panic value recorded as the failure reason.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::bus::{channel_for, BoxFuture, BusSender, ControlMessage, MessageBus};
use crate::errors::{Result, TaskmasterError};
use crate::proc::{ENV_PORT_FILE, ENV_TASK_NAME};

/// Context handed to a worker body when it runs.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// The worker's normalized task name.
    pub name: String,
    /// Cooperative-shutdown signal; flips to `true` when the worker should
    /// wind down.
    pub shutdown: watch::Receiver<bool>,
}

/// What a worker does, as a polymorphic capability: one operation, "run
/// given this worker's context".
pub trait WorkerBody: Send + 'static {
    fn run(self: Box<Self>, ctx: WorkerContext) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Connection of one worker to the control plane.
pub struct WorkerAgent {
    name: String,
    sender: BusSender,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerAgent {
    /// Connect under `name`: verify identity against the spawning
    /// environment, subscribe to the worker's own channel, and announce
    /// `launched` to the master.
    pub async fn connect(name: &str, bus: Arc<dyn MessageBus>) -> Result<Arc<Self>> {
        let name = channel_for(name);
        if name.is_empty() {
            return Err(TaskmasterError::ConfigError(
                "missing worker name".to_string(),
            ));
        }

        // A process spawned by the master carries its task name in the
        // environment; a mismatch means we were launched as somebody else.
        if let Ok(expected) = std::env::var(ENV_TASK_NAME) {
            if channel_for(&expected) != name {
                return Err(TaskmasterError::ConfigError(format!(
                    "worker name '{name}' does not match spawned identity '{expected}'"
                )));
            }
        }

        let sender = BusSender::new(bus.clone());
        let mut sub = bus.subscribe(&name).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let agent = Arc::new(Self {
            name,
            sender,
            shutdown_tx,
            shutdown_rx,
        });

        // Inbox: the only verb addressed to a worker is the status query.
        let inbox = agent.clone();
        tokio::spawn(async move {
            while let Some(raw) = sub.recv().await {
                match ControlMessage::parse(&raw) {
                    Ok(ControlMessage::GetStatus) => {
                        debug!(worker = %inbox.name, "status query; answering launched");
                        if let Err(err) = inbox.announce().await {
                            warn!(worker = %inbox.name, error = %err, "status answer failed");
                        }
                    }
                    Ok(other) => {
                        debug!(worker = %inbox.name, message = ?other, "ignoring verb not addressed to workers");
                    }
                    Err(err) => {
                        debug!(worker = %inbox.name, error = %err, "ignoring unparseable message");
                    }
                }
            }
            debug!(worker = %inbox.name, "worker subscription closed");
        });

        agent.announce().await?;
        Ok(agent)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tell the master this worker is confirmed running.
    pub async fn announce(&self) -> Result<()> {
        self.sender
            .send_to_master(&ControlMessage::Launched(self.name.clone()))
            .await
    }

    /// Tell the master this worker stopped regularly.
    pub async fn regular_stop(&self) -> Result<()> {
        self.sender
            .send_to_master(&ControlMessage::Stopped(self.name.clone()))
            .await
    }

    /// Ask the master to start another task (and its requirements).
    pub async fn start_service(&self, name: &str) -> Result<()> {
        self.sender
            .send_to_master(&ControlMessage::Start(channel_for(name)))
            .await
    }

    /// Ask the master to stop another task (and its dependents).
    pub async fn stop_service(&self, name: &str) -> Result<()> {
        self.sender
            .send_to_master(&ControlMessage::Stop(channel_for(name)))
            .await
    }

    /// Observe the cooperative-shutdown signal.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Flip the cooperative-shutdown signal for this worker's body.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the worker's body to completion, then confirm the stop.
    ///
    /// A panicking body is recovered here: the panic value becomes the
    /// recorded failure reason and the master still receives a regular
    /// `stopped` confirmation.
    pub async fn run_body(&self, body: Box<dyn WorkerBody>) -> Result<()> {
        let ctx = WorkerContext {
            name: self.name.clone(),
            shutdown: self.shutdown_rx.clone(),
        };

        match tokio::spawn(body.run(ctx)).await {
            Ok(Ok(())) => {
                info!(worker = %self.name, "worker body finished");
            }
            Ok(Err(err)) => {
                warn!(worker = %self.name, error = %err, "worker body failed");
            }
            Err(join_err) if join_err.is_panic() => {
                let reason = panic_reason(join_err.into_panic());
                error!(
                    worker = %self.name,
                    %reason,
                    "worker body panicked; converting to a normal stop"
                );
            }
            Err(join_err) => {
                warn!(worker = %self.name, error = %join_err, "worker body cancelled");
            }
        }

        self.regular_stop().await
    }
}

/// Read the bus endpoint published by the master, honoring the spawned
/// environment's pointer to the discovery file.
pub fn discover_endpoint(default_path: &std::path::Path) -> Result<String> {
    let path = std::env::var(ENV_PORT_FILE)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_path.to_path_buf());
    let endpoint = std::fs::read_to_string(&path).map_err(|e| {
        TaskmasterError::ConfigError(format!(
            "cannot read bus endpoint from {}: {e}",
            path.display()
        ))
    })?;
    Ok(endpoint.trim().to_string())
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
