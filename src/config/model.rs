// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::parse_duration;
use crate::errors::Result;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [master]
/// tick_interval = "5s"
/// kill_attempts = 3
///
/// [task.logger]
/// payload = "payloads/logger"
///
/// [task.worker1]
/// must_start = true
/// requires = ["logger"]
/// command = "worker1"
/// env = { MODE = "batch" }
/// ```
///
/// All sections are optional and have reasonable defaults, except that at
/// least one `[task.<name>]` must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Orchestrator-wide settings from `[master]`.
    #[serde(default)]
    pub master: MasterSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Constructed only through
/// [`TryFrom<RawConfigFile>`] (see `config::validate`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub master: MasterSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Internal constructor used after validation has passed.
    pub(crate) fn new_unchecked(
        master: MasterSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { master, task }
    }

    /// Parsed reconciliation tick interval.
    pub fn tick_interval(&self) -> Result<Duration> {
        parse_duration(&self.master.tick_interval)
    }

    /// Parsed grace period applied before the orchestrator exits after
    /// detecting global shutdown readiness.
    pub fn grace_period(&self) -> Result<Duration> {
        parse_duration(&self.master.grace_period)
    }

    /// Parsed bound on how long a cooperative shutdown may take before the
    /// orchestrator forces its own exit.
    pub fn drain_timeout(&self) -> Result<Duration> {
        parse_duration(&self.master.drain_timeout)
    }
}

/// `[master]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MasterSection {
    /// How often the reconciliation loop re-evaluates every task.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,

    /// Number of graceful stop attempts before escalating to a forced kill.
    #[serde(default = "default_kill_attempts")]
    pub kill_attempts: u32,

    /// Pause between detecting global shutdown readiness and exiting.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    /// Upper bound on a cooperative shutdown before a forced exit.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,

    /// Well-known file carrying the bus endpoint address for spawned workers.
    #[serde(default = "default_port_file")]
    pub port_file: PathBuf,

    /// Log verbosity handed to spawned workers via the environment.
    #[serde(default = "default_worker_log_level")]
    pub worker_log_level: String,

    /// Log size limit (bytes) handed to spawned workers via the environment.
    #[serde(default)]
    pub worker_log_size_limit: u64,
}

fn default_tick_interval() -> String {
    "5s".to_string()
}

fn default_kill_attempts() -> u32 {
    3
}

fn default_grace_period() -> String {
    "3s".to_string()
}

fn default_drain_timeout() -> String {
    "10s".to_string()
}

fn default_port_file() -> PathBuf {
    PathBuf::from("./taskmaster.port")
}

fn default_worker_log_level() -> String {
    "info".to_string()
}

impl Default for MasterSection {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            kill_attempts: default_kill_attempts(),
            grace_period: default_grace_period(),
            drain_timeout: default_drain_timeout(),
            port_file: default_port_file(),
            worker_log_level: default_worker_log_level(),
            worker_log_size_limit: 0,
        }
    }
}

/// `[task.<name>]` section.
///
/// A task carries either an external `command` (plus optional `args`) or a
/// `payload` path whose bytes are executed from memory; never both.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Whether this task should be running from startup.
    #[serde(default)]
    pub must_start: bool,

    /// Names of tasks that must be confirmed running before this one
    /// is launched.
    #[serde(default)]
    pub requires: Vec<String>,

    /// External program to launch.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Path to an executable image launched from memory.
    #[serde(default)]
    pub payload: Option<PathBuf>,

    /// Extra environment variables injected into the spawned process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl TaskConfig {
    /// Whether this task can actually be launched.
    pub fn has_launch_spec(&self) -> bool {
        self.command.is_some() || self.payload.is_some()
    }
}
