// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskmasterError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    #[error("Task '{task}' requires unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Cycle detected in dependency graph: {0}")]
    DependencyCycle(String),

    #[error("Task '{task}' is still required by {dependents:?}")]
    TaskInUse {
        task: String,
        dependents: Vec<String>,
    },

    #[error("Task '{0}' is still running")]
    TaskStillRunning(String),

    #[error("Bus error: {0}")]
    BusError(String),

    #[error("Unparseable control message: {0:?}")]
    ProtocolError(String),

    #[error("Failed to spawn process for task '{task}': {source}")]
    SpawnError {
        task: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskmasterError>;
