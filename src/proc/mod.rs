// src/proc/mod.rs

//! Process launching and supervision.

pub mod launcher;
pub mod signals;
pub mod supervisor;

pub use launcher::{launch, WorkerEnv};
pub use supervisor::check;

/// Environment variable carrying the spawned task's normalized name.
pub const ENV_TASK_NAME: &str = "TASKMASTER_NAME";
/// Environment variable carrying the log verbosity for spawned workers.
pub const ENV_LOG_LEVEL: &str = "TASKMASTER_LOG";
/// Environment variable carrying the log size limit for spawned workers.
pub const ENV_LOG_SIZE_LIMIT: &str = "TASKMASTER_LOG_SIZE";
/// Environment variable pointing at the bus endpoint discovery file.
pub const ENV_PORT_FILE: &str = "TASKMASTER_PORT_FILE";
