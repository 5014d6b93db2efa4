// src/bus/protocol.rs

//! Wire format of the control plane.
//!
//! Every message is a single string `"<verb> <argument>"`. The format is
//! kept for compatibility with existing workers, but parsing goes through
//! [`ControlMessage::parse`] so routing can match exhaustively on a typed
//! verb instead of splitting strings ad hoc.

use std::fmt;

use crate::errors::{Result, TaskmasterError};

/// Channel the master listens on.
pub const MASTER_CHANNEL: &str = "MASTER";

/// Bus channel for a task: its uppercase-normalized name.
pub fn channel_for(task: &str) -> String {
    task.trim().to_uppercase()
}

/// A parsed control-plane message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Worker -> master: the named task is confirmed running.
    Launched(String),
    /// Worker -> master: the named task is confirmed stopped.
    Stopped(String),
    /// Any -> master: request the named task (and its requirements) started.
    Start(String),
    /// Any -> master: request the named task (and its dependents) stopped.
    Stop(String),
    /// Master -> worker: status query; the worker answers with `launched`.
    GetStatus,
}

impl ControlMessage {
    /// Parse a raw bus message. Unknown verbs or missing arguments are
    /// reported as [`TaskmasterError::ProtocolError`].
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split_whitespace();
        let verb = parts.next();
        let arg = parts.next();

        match (verb, arg) {
            (Some("launched"), Some(name)) => Ok(ControlMessage::Launched(channel_for(name))),
            (Some("stopped"), Some(name)) => Ok(ControlMessage::Stopped(channel_for(name))),
            (Some("start"), Some(name)) => Ok(ControlMessage::Start(channel_for(name))),
            (Some("stop"), Some(name)) => Ok(ControlMessage::Stop(channel_for(name))),
            (Some("get"), Some("status")) => Ok(ControlMessage::GetStatus),
            _ => Err(TaskmasterError::ProtocolError(raw.to_string())),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Launched(name) => write!(f, "launched {name}"),
            ControlMessage::Stopped(name) => write!(f, "stopped {name}"),
            ControlMessage::Start(name) => write!(f, "start {name}"),
            ControlMessage::Stop(name) => write!(f, "stop {name}"),
            ControlMessage::GetStatus => write!(f, "get status"),
        }
    }
}
