// src/payloads.rs

//! Embedded payload bytes, keyed by uppercase task name.
//!
//! Packaging executables into payloads is an external concern; the
//! orchestrator only ever asks "give me the bytes for this task name".

use std::collections::HashMap;
use std::fs;

use tracing::info;

use crate::bus::channel_for;
use crate::config::ConfigFile;
use crate::errors::{Result, TaskmasterError};

#[derive(Debug, Default)]
pub struct PayloadStore {
    payloads: HashMap<String, Vec<u8>>,
}

impl PayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every payload path referenced by the config. A missing or
    /// unreadable payload file is a fatal configuration error.
    pub fn load_from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut store = Self::new();

        for (name, tc) in cfg.task.iter() {
            if let Some(path) = &tc.payload {
                let bytes = fs::read(path).map_err(|e| {
                    TaskmasterError::ConfigError(format!(
                        "task '{}': cannot read payload {}: {}",
                        name,
                        path.display(),
                        e
                    ))
                })?;
                info!(task = %name, path = %path.display(), len = bytes.len(), "payload loaded");
                store.insert(name, bytes);
            }
        }

        Ok(store)
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.payloads.insert(channel_for(name), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.payloads.get(&channel_for(name)).map(|b| b.as_slice())
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}
