// src/engine/router.rs

//! Inbound control-plane routing for the master.
//!
//! Subscribes to the master channel and maps each verb onto the registry:
//! worker confirmations flip observed state, operator requests propagate
//! through the dependency resolver. Unknown verbs and unknown task names
//! are logged and dropped; the protocol is idempotent, so duplicates are
//! harmless.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bus::{ControlMessage, MessageBus, MASTER_CHANNEL};
use crate::errors::Result;
use crate::task::resolver::{recursive_enable, recursive_stop};
use crate::task::Registry;

pub struct Router {
    registry: Arc<Registry>,
    bus: Arc<dyn MessageBus>,
}

impl Router {
    pub fn new(registry: Arc<Registry>, bus: Arc<dyn MessageBus>) -> Self {
        Self { registry, bus }
    }

    /// Receive loop. Blocks on the bus until it closes.
    pub async fn run(self) -> Result<()> {
        let mut sub = self.bus.subscribe(MASTER_CHANNEL).await?;
        debug!("control router listening on master channel");

        while let Some(raw) = sub.recv().await {
            debug!(message = %raw, "control message received");
            match ControlMessage::parse(&raw) {
                Ok(msg) => self.dispatch(msg),
                Err(err) => {
                    debug!(error = %err, "ignoring unparseable control message");
                }
            }
        }

        warn!("master subscription closed; router exiting");
        Ok(())
    }

    /// Apply one parsed message to the registry.
    pub fn dispatch(&self, msg: ControlMessage) {
        match msg {
            ControlMessage::Launched(name) => match self.registry.get(&name) {
                Some(task) => task.started(),
                None => warn!(task = %name, "launch confirmation for unknown task"),
            },
            ControlMessage::Stopped(name) => match self.registry.get(&name) {
                Some(task) => task.stopped(),
                None => warn!(task = %name, "stop confirmation for unknown task"),
            },
            ControlMessage::Start(name) => match self.registry.get(&name) {
                Some(task) => recursive_enable(&self.registry, &task),
                None => warn!(task = %name, "start request for unknown task"),
            },
            ControlMessage::Stop(name) => match self.registry.get(&name) {
                Some(task) => {
                    warn!(task = %name, "stop requested; propagating to dependents");
                    recursive_stop(&self.registry, &task);
                }
                None => warn!(task = %name, "stop request for unknown task"),
            },
            ControlMessage::GetStatus => {
                debug!("status query addressed to the master; ignoring");
            }
        }
    }
}
