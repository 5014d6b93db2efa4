#![allow(dead_code)]

use std::collections::BTreeMap;
use taskmaster::config::{ConfigFile, MasterSection, RawConfigFile, TaskConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                master: MasterSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_tick_interval(mut self, interval: &str) -> Self {
        self.config.master.tick_interval = interval.to_string();
        self
    }

    pub fn with_kill_attempts(mut self, attempts: u32) -> Self {
        self.config.master.kill_attempts = attempts;
        self
    }

    pub fn with_port_file(mut self, path: &str) -> Self {
        self.config.master.port_file = path.into();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Variant for tests that assert validation failures.
    pub fn try_build(self) -> taskmaster::errors::Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn command(mut self, program: &str) -> Self {
        self.task.command = Some(program.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.task.args.push(arg.to_string());
        self
    }

    pub fn payload(mut self, path: &str) -> Self {
        self.task.payload = Some(path.into());
        self
    }

    pub fn must_start(mut self, val: bool) -> Self {
        self.task.must_start = val;
        self
    }

    pub fn requires(mut self, dep: &str) -> Self {
        self.task.requires.push(dep.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
