// src/proc/signals.rs

//! Thin wrappers around OS-level process control signals.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Graceful terminate request.
pub fn terminate(pid: Pid) -> Result<(), Errno> {
    kill(pid, Signal::SIGTERM)
}

/// Forced, non-ignorable kill.
pub fn force_kill(pid: Pid) -> Result<(), Errno> {
    kill(pid, Signal::SIGKILL)
}

/// Signal-0 liveness probe: does the pid resolve to a live process we may
/// signal?
pub fn is_alive(pid: Pid) -> bool {
    kill(pid, None).is_ok()
}
