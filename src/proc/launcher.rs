// src/proc/launcher.rs

//! Process creation.
//!
//! A task's launch spec is materialized either as an external command or as
//! an anonymous memory-backed executable image (memfd + `/proc/self/fd`),
//! so embedded payloads never touch persistent storage. Either way the
//! spawned process inherits the parent's standard streams and receives the
//! identity/config environment described in [`WorkerEnv`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskmasterError};
use crate::proc::{ENV_LOG_LEVEL, ENV_LOG_SIZE_LIMIT, ENV_PORT_FILE, ENV_TASK_NAME};
use crate::task::task::{LaunchSpec, ProcessHandle, Task};

/// Identity and config handed to every spawned process via the environment.
#[derive(Debug, Clone)]
pub struct WorkerEnv {
    pub log_level: String,
    pub log_size_limit: u64,
    pub port_file: PathBuf,
}

impl WorkerEnv {
    fn to_env_pairs(&self, task_name: &str) -> Vec<(String, String)> {
        vec![
            (ENV_TASK_NAME.to_string(), task_name.to_string()),
            (ENV_LOG_LEVEL.to_string(), self.log_level.clone()),
            (
                ENV_LOG_SIZE_LIMIT.to_string(),
                self.log_size_limit.to_string(),
            ),
            (
                ENV_PORT_FILE.to_string(),
                self.port_file.display().to_string(),
            ),
        ]
    }
}

/// Launch the task's process and start supervising it.
///
/// Preconditions: the task is not already confirmed running (probed via its
/// recorded handle) and has a launch spec. On success the task's process
/// handle is recorded, the start transition opens, and an asynchronous
/// waiter reaps the process and confirms the stop when it exits. A spawn
/// failure is returned to the caller and leaves the transition closed.
pub async fn launch(task: Arc<Task>, worker_env: &WorkerEnv) -> Result<()> {
    if let Some(handle) = task.process() {
        if handle.is_alive() {
            warn!(
                task = %task.name(),
                pid = handle.pid().as_raw(),
                "process already running; skipping launch"
            );
            return Ok(());
        }
    }

    let spec = task.spec().cloned().ok_or_else(|| {
        TaskmasterError::ConfigError(format!("task '{}' has no launch spec", task.name()))
    })?;

    // For in-memory launches the backing file must stay open until the
    // child has been spawned from its /proc/self/fd path.
    let (mut cmd, _memfd_guard) = match spec {
        LaunchSpec::Command { program, args } => {
            let mut c = Command::new(&program);
            c.args(&args);
            info!(task = %task.name(), %program, "launching external command");
            (c, None)
        }
        LaunchSpec::InMemory { payload } => {
            let (c, guard) = memfd_command(&task, &payload)?;
            (c, Some(guard))
        }
    };

    cmd.envs(task.env().iter().cloned());
    cmd.envs(worker_env.to_env_pairs(task.name()));

    let mut child = cmd.spawn().map_err(|e| TaskmasterError::SpawnError {
        task: task.name().clone(),
        source: e,
    })?;

    let pid = child.id().ok_or_else(|| TaskmasterError::SpawnError {
        task: task.name().clone(),
        source: std::io::Error::other("process exited before a pid could be recorded"),
    })?;

    let handle = ProcessHandle::new(pid as i32);
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    task.attach_process(handle.clone(), cancel_tx);
    info!(task = %task.name(), pid, "process launched");

    // Waiter: reap the process, record its exit, confirm the stop. The
    // cancellation scope only unwinds cooperative work; actual process
    // termination is driven by explicit signals from the stop escalation.
    let task = task.clone();
    tokio::spawn(async move {
        tokio::spawn(async move {
            while cancel_rx.changed().await.is_ok() {
                if *cancel_rx.borrow() {
                    debug!("cancellation scope closed");
                    break;
                }
            }
        });

        match child.wait().await {
            Ok(status) if status.success() => {
                info!(task = %task.name(), pid, "process finished successfully");
            }
            Ok(status) => {
                warn!(
                    task = %task.name(),
                    pid,
                    exit_code = status.code().unwrap_or(-1),
                    "process finished with error"
                );
            }
            Err(err) => {
                warn!(task = %task.name(), pid, error = %err, "wait on process failed");
            }
        }

        handle.mark_exited();
        task.clear_process();
        task.stopped();
    });

    Ok(())
}

/// Build a command that executes `payload` from an anonymous memory-backed
/// file. A payload without the platform's executable header is logged as a
/// warning but still attempted; the spawn itself is the arbiter.
#[cfg(target_os = "linux")]
fn memfd_command(task: &Task, payload: &[u8]) -> Result<(Command, std::fs::File)> {
    use std::ffi::CString;
    use std::io::{Seek, Write};
    use std::os::fd::AsRawFd;

    use nix::sys::memfd::{memfd_create, MemFdCreateFlag};

    const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

    if payload.len() < ELF_MAGIC.len() || &payload[..ELF_MAGIC.len()] != ELF_MAGIC {
        warn!(
            task = %task.name(),
            len = payload.len(),
            "payload is missing the ELF magic; attempting launch anyway"
        );
    }

    let c_name = CString::new(task.name().as_str())
        .map_err(|e| TaskmasterError::ConfigError(format!("task name not memfd-safe: {e}")))?;
    let fd = memfd_create(c_name.as_c_str(), MemFdCreateFlag::MFD_CLOEXEC)
        .map_err(|errno| TaskmasterError::IoError(std::io::Error::from(errno)))?;

    let mut file = std::fs::File::from(fd);
    file.write_all(payload)?;
    file.rewind()?;

    let path = format!("/proc/self/fd/{}", file.as_raw_fd());
    info!(task = %task.name(), %path, "launching from memory-backed image");

    Ok((Command::new(path), file))
}

#[cfg(not(target_os = "linux"))]
fn memfd_command(task: &Task, _payload: &[u8]) -> Result<(Command, std::fs::File)> {
    Err(TaskmasterError::ConfigError(format!(
        "task '{}': in-memory launch is only supported on Linux",
        task.name()
    )))
}
