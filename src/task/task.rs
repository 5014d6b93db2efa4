// src/task/task.rs

//! Per-task state machine.
//!
//! A task's state is the triple (must_start, in_progress, launched):
//! desired, transitional, and observed state. `launched` changes only
//! through [`Task::started`] / [`Task::stopped`], which are invoked by the
//! supervisor (or the message router relaying a worker's confirmation) —
//! never directly by desire-setting code. All mutation happens under the
//! task's own lock; the registry has a separate lock for structural changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use nix::unistd::Pid;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::bus::channel_for;
use crate::proc::signals;

/// Canonical task name type.
pub type TaskName = String;

/// How a task's process is materialized.
#[derive(Debug, Clone)]
pub enum LaunchSpec {
    /// Embedded executable bytes, executed from an anonymous memory-backed
    /// file without touching persistent storage.
    InMemory { payload: Vec<u8> },
    /// External program resolved through the OS.
    Command { program: String, args: Vec<String> },
}

/// Opaque reference to a spawned OS process.
///
/// The `alive` flag is flipped by the waiter when the process is reaped, so
/// liveness probes can short-circuit without a signal round trip.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Pid,
    alive: Arc<AtomicBool>,
}

impl ProcessHandle {
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Called by the waiter once the process has been reaped.
    pub fn mark_exited(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Combined liveness: not yet reaped by us, and signal-0 delivery works.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && signals::is_alive(self.pid)
    }
}

/// Read-only copy of a task's mutable state, taken under the task lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub must_start: bool,
    pub in_progress: bool,
    pub launched: bool,
    pub reminder: u32,
    pub has_process: bool,
}

#[derive(Debug, Default)]
struct TaskState {
    must_start: bool,
    in_progress: bool,
    launched: bool,
    reminder: u32,
    process: Option<ProcessHandle>,
    cancel: Option<watch::Sender<bool>>,
}

enum StopAction {
    /// No process handle recorded: resynchronize to stopped.
    Resync,
    /// Graceful terminate (first attempt or reminder).
    Terminate(ProcessHandle, u32),
    /// Escalation threshold reached: forced kill.
    ForceKill(ProcessHandle),
}

/// The unit of supervision.
pub struct Task {
    name: TaskName,
    requires: Vec<TaskName>,
    env: Vec<(String, String)>,
    spec: Option<LaunchSpec>,
    kill_after: u32,
    state: Mutex<TaskState>,
}

impl Task {
    /// `kill_after` is the escalation threshold K: the K-th consecutive
    /// unanswered stop attempt is a forced kill.
    pub fn new(
        name: &str,
        requires: Vec<String>,
        spec: Option<LaunchSpec>,
        env: Vec<(String, String)>,
        must_start: bool,
        kill_after: u32,
    ) -> Self {
        Self {
            name: channel_for(name),
            requires: requires.iter().map(|r| channel_for(r)).collect(),
            env,
            spec,
            kill_after: kill_after.max(1),
            state: Mutex::new(TaskState {
                must_start,
                ..TaskState::default()
            }),
        }
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn requires(&self) -> &[TaskName] {
        &self.requires
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn spec(&self) -> Option<&LaunchSpec> {
        self.spec.as_ref()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let st = self.state.lock().unwrap();
        StateSnapshot {
            must_start: st.must_start,
            in_progress: st.in_progress,
            launched: st.launched,
            reminder: st.reminder,
            has_process: st.process.is_some(),
        }
    }

    pub fn process(&self) -> Option<ProcessHandle> {
        self.state.lock().unwrap().process.clone()
    }

    /// Mark the task as wanted. Does not guarantee its requirements are
    /// satisfied; the reconciler gates the actual launch.
    pub fn enable(&self) {
        let mut st = self.state.lock().unwrap();
        if st.must_start {
            if st.launched {
                debug!(task = %self.name, "already running");
            } else {
                debug!(task = %self.name, "start already in progress");
            }
            return;
        }
        st.must_start = true;
        info!(task = %self.name, "enabled");
    }

    /// Mark the task as unwanted and open a stop transition.
    pub fn disable(&self) {
        let mut st = self.state.lock().unwrap();
        if !st.must_start {
            if !st.launched {
                debug!(task = %self.name, "already stopped");
            } else {
                debug!(task = %self.name, "stop already in progress");
            }
            return;
        }
        st.must_start = false;
        st.in_progress = true;
        info!(task = %self.name, "disabled");
    }

    /// Confirm the task as running. Idempotent; resets the stop reminder.
    /// Only the supervisor (or a relayed worker confirmation) calls this.
    pub fn started(&self) {
        let mut st = self.state.lock().unwrap();
        st.reminder = 0;
        if st.launched && !st.in_progress {
            debug!(task = %self.name, "already confirmed started");
            return;
        }
        st.launched = true;
        st.in_progress = false;
        info!(task = %self.name, "started");
    }

    /// Confirm the task as stopped. Idempotent; resets the stop reminder
    /// and settles any dangling transition.
    pub fn stopped(&self) {
        let mut st = self.state.lock().unwrap();
        st.reminder = 0;
        if !st.launched && !st.in_progress {
            debug!(task = %self.name, "already confirmed stopped");
            return;
        }
        st.launched = false;
        st.in_progress = false;
        info!(task = %self.name, "stopped");
    }

    /// One stop attempt, escalating by the reminder counter: attempts
    /// 1..K-1 send a graceful terminate, the K-th sends a forced kill.
    /// Every call increments the counter so repeated reconciliation ticks
    /// escalate instead of repeating at the same severity.
    pub fn stop(&self) {
        let action = {
            let mut st = self.state.lock().unwrap();
            let step = st.reminder;
            st.reminder += 1;

            match st.process.clone() {
                None => StopAction::Resync,
                Some(handle) => {
                    if step == 0 {
                        // First attempt also cancels the task's cooperative
                        // scope; in-process work tied to it should unwind.
                        if let Some(cancel) = st.cancel.take() {
                            let _ = cancel.send(true);
                        }
                    }
                    if step + 1 >= self.kill_after {
                        StopAction::ForceKill(handle)
                    } else {
                        StopAction::Terminate(handle, step)
                    }
                }
            }
        };

        match action {
            StopAction::Resync => {
                debug!(task = %self.name, "no process handle; resynchronizing to stopped");
                self.stopped();
            }
            StopAction::Terminate(handle, step) => {
                info!(
                    task = %self.name,
                    pid = handle.pid().as_raw(),
                    reminder = step,
                    "sending graceful terminate"
                );
                if let Err(errno) = signals::terminate(handle.pid()) {
                    warn!(
                        task = %self.name,
                        pid = handle.pid().as_raw(),
                        error = %errno,
                        "terminate signal failed"
                    );
                }
            }
            StopAction::ForceKill(handle) => self.kill(&handle),
        }
    }

    /// Forced termination. An already-exited target counts as success and
    /// resynchronizes state; delivery failure is retried on later ticks,
    /// since giving up would leave an immortal zombie.
    pub fn kill(&self, handle: &ProcessHandle) {
        info!(task = %self.name, pid = handle.pid().as_raw(), "sending forced kill");
        match signals::force_kill(handle.pid()) {
            Ok(()) => {}
            Err(nix::errno::Errno::ESRCH) => {
                debug!(task = %self.name, "process already gone; marking stopped");
                self.clear_process();
                self.stopped();
            }
            Err(errno) => {
                error!(
                    task = %self.name,
                    pid = handle.pid().as_raw(),
                    error = %errno,
                    "forced kill failed; will retry on next tick"
                );
            }
        }
    }

    /// Raise the reminder counter so the next stop attempt is a forced kill.
    pub fn escalate(&self) {
        let mut st = self.state.lock().unwrap();
        st.reminder = self.kill_after;
    }

    /// Record a freshly spawned process and open the start transition.
    /// Called by the launcher only.
    pub fn attach_process(&self, handle: ProcessHandle, cancel: watch::Sender<bool>) {
        let mut st = self.state.lock().unwrap();
        st.process = Some(handle);
        st.cancel = Some(cancel);
        st.in_progress = true;
    }

    /// Drop the process handle and cancellation scope. Called by the waiter
    /// after the process has been reaped.
    pub fn clear_process(&self) {
        let mut st = self.state.lock().unwrap();
        st.process = None;
        st.cancel = None;
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("must_start", &snap.must_start)
            .field("in_progress", &snap.in_progress)
            .field("launched", &snap.launched)
            .field("reminder", &snap.reminder)
            .finish()
    }
}
