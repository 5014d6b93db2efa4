// src/proc/supervisor.rs

//! Liveness probing of supervised processes.

use tracing::debug;

use crate::bus::{BusSender, ControlMessage};
use crate::task::task::Task;

/// Combined liveness probe for a task's process.
///
/// Local half: does the recorded handle still resolve to a live OS process?
/// Control-plane half: publish a status query on the task's channel; a
/// cooperating worker answers `launched <self>` asynchronously through the
/// normal routing path (the answer is not a return value here).
///
/// A task with no recorded handle is reported as not launched and
/// resynchronized to stopped.
pub async fn check(task: &Task, sender: &BusSender) -> bool {
    let handle = match task.process() {
        Some(handle) => handle,
        None => {
            debug!(task = %task.name(), "not launched; resynchronizing to stopped");
            task.stopped();
            return false;
        }
    };

    if !handle.is_alive() {
        debug!(
            task = %task.name(),
            pid = handle.pid().as_raw(),
            "recorded process is gone; resynchronizing to stopped"
        );
        task.clear_process();
        task.stopped();
        return false;
    }

    // Best-effort round trip; loss is tolerated, the next tick re-probes.
    if let Err(err) = sender.send_to(task.name(), &ControlMessage::GetStatus).await {
        debug!(task = %task.name(), error = %err, "status query not delivered");
    }

    debug!(
        task = %task.name(),
        pid = handle.pid().as_raw(),
        "process confirmed alive"
    );
    true
}
