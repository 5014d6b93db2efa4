// tests/state_machine.rs

use std::error::Error;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use taskmaster::task::{ProcessHandle, Task};
use taskmaster_test_utils::init_tracing;
use tokio::sync::watch;

type TestResult = Result<(), Box<dyn Error>>;

fn plain_task(name: &str) -> Task {
    Task::new(name, vec![], None, vec![], false, 3)
}

/// Spawn a shell that ignores SIGTERM, so only SIGKILL can take it down.
/// Waits for the shell to echo after installing the trap, so a signal sent
/// right after return cannot race the trap setup.
fn spawn_term_resistant() -> Child {
    let mut child = Command::new("sh")
        .args(["-c", "trap '' TERM; echo ready; while :; do sleep 0.1; done"])
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn term-resistant shell");
    let mut line = String::new();
    BufReader::new(child.stdout.take().expect("child stdout"))
        .read_line(&mut line)
        .expect("wait for trap to be installed");
    child
}

fn wait_for_exit(child: &mut Child, bound: Duration) -> bool {
    let deadline = Instant::now() + bound;
    while Instant::now() < deadline {
        if child.try_wait().expect("try_wait").is_some() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn enable_and_disable_are_idempotent() -> TestResult {
    init_tracing();
    let task = plain_task("a");

    assert!(!task.snapshot().must_start);

    task.enable();
    task.enable();
    let s = task.snapshot();
    assert!(s.must_start);
    assert!(!s.in_progress);

    task.disable();
    let s = task.snapshot();
    assert!(!s.must_start);
    assert!(s.in_progress);

    task.disable();
    assert!(task.snapshot().in_progress, "repeat disable must not settle the transition");

    Ok(())
}

#[test]
fn confirmations_settle_transitions_and_reset_the_reminder() -> TestResult {
    init_tracing();
    let task = plain_task("a");

    task.enable();
    task.started();
    let s = task.snapshot();
    assert!(s.launched);
    assert!(!s.in_progress);
    assert_eq!(s.reminder, 0);

    // Duplicate confirmation is harmless.
    task.started();
    assert!(task.snapshot().launched);

    task.disable();
    task.stopped();
    let s = task.snapshot();
    assert!(!s.launched);
    assert!(!s.in_progress);
    assert_eq!(s.reminder, 0);

    Ok(())
}

#[test]
fn stop_without_a_process_resynchronizes_to_stopped() -> TestResult {
    init_tracing();
    let task = plain_task("a");

    task.enable();
    task.started();
    task.disable();
    assert!(task.snapshot().in_progress);

    task.stop();
    let s = task.snapshot();
    assert!(!s.launched);
    assert!(!s.in_progress);
    assert_eq!(s.reminder, 0, "resync counts as a stop confirmation");

    Ok(())
}

#[cfg(unix)]
#[test]
fn third_stop_attempt_kills_a_term_resistant_process() -> TestResult {
    init_tracing();
    let task = plain_task("stubborn");

    let mut child = spawn_term_resistant();
    let handle = ProcessHandle::new(child.id() as i32);
    let (cancel_tx, _cancel_rx) = watch::channel(false);
    task.attach_process(handle, cancel_tx);
    task.started();
    task.disable();

    // Two graceful attempts: the shell traps TERM and keeps running.
    task.stop();
    task.stop();
    std::thread::sleep(Duration::from_millis(200));
    assert!(child.try_wait()?.is_none(), "SIGTERM must not end this process");
    assert_eq!(task.snapshot().reminder, 2);

    // Third attempt escalates to SIGKILL.
    task.stop();
    assert!(wait_for_exit(&mut child, Duration::from_secs(3)));

    Ok(())
}

#[cfg(unix)]
#[test]
fn escalate_makes_the_next_stop_a_kill() -> TestResult {
    init_tracing();
    let task = plain_task("forced");

    let mut child = spawn_term_resistant();
    let handle = ProcessHandle::new(child.id() as i32);
    let (cancel_tx, _cancel_rx) = watch::channel(false);
    task.attach_process(handle, cancel_tx);
    task.started();
    task.disable();

    task.escalate();
    task.stop();
    assert!(wait_for_exit(&mut child, Duration::from_secs(3)));

    Ok(())
}

#[cfg(unix)]
#[test]
fn first_stop_attempt_fires_the_cancellation_scope() -> TestResult {
    init_tracing();
    let task = plain_task("scoped");

    let mut child = Command::new("sleep").arg("30").spawn()?;
    let handle = ProcessHandle::new(child.id() as i32);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    task.attach_process(handle, cancel_tx);
    task.started();
    task.disable();

    task.stop();
    assert!(*cancel_rx.borrow(), "first stop must close the scope");

    // `sleep` has no TERM trap, so the first attempt already ends it.
    assert!(wait_for_exit(&mut child, Duration::from_secs(3)));

    Ok(())
}
