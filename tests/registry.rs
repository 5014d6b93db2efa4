// tests/registry.rs

use std::error::Error;

use taskmaster::errors::TaskmasterError;
use taskmaster::payloads::PayloadStore;
use taskmaster::task::{Registry, Task};
use taskmaster_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use taskmaster_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn task(name: &str, requires: &[&str]) -> Task {
    Task::new(
        name,
        requires.iter().map(|r| r.to_string()).collect(),
        None,
        vec![],
        false,
        3,
    )
}

#[test]
fn registers_and_normalizes_names() -> TestResult {
    init_tracing();
    let registry = Registry::new(3);

    registry.add_task(task("logger", &[]))?;
    registry.add_task(task("Worker1", &["logger"]))?;

    assert_eq!(registry.len(), 2);
    assert!(registry.contains("LOGGER"));
    assert!(registry.contains("worker1"));
    assert_eq!(registry.get("worker1").unwrap().requires(), ["LOGGER"]);

    Ok(())
}

#[test]
fn rejects_duplicate_names() -> TestResult {
    init_tracing();
    let registry = Registry::new(3);

    registry.add_task(task("a", &[]))?;
    let err = registry.add_task(task("A", &[])).unwrap_err();
    assert!(matches!(err, TaskmasterError::DuplicateTask(name) if name == "A"));
    assert_eq!(registry.len(), 1);

    Ok(())
}

#[test]
fn rejects_unregistered_requirements() {
    init_tracing();
    let registry = Registry::new(3);

    let err = registry.add_task(task("b", &["a"])).unwrap_err();
    assert!(matches!(
        err,
        TaskmasterError::UnknownDependency { ref dependency, .. } if dependency == "A"
    ));
    assert!(registry.is_empty(), "failed registration must not change the registry");
}

#[test]
fn rejects_self_requirement_at_registration() {
    init_tracing();
    let registry = Registry::new(3);

    // Requirements must already be registered, so a task can never name
    // itself; the same rule makes registration-time cycles unreachable.
    let err = registry.add_task(task("d", &["d"])).unwrap_err();
    assert!(matches!(err, TaskmasterError::UnknownDependency { .. }));
    assert!(registry.is_empty());
}

#[test]
fn removal_is_refused_while_required() -> TestResult {
    init_tracing();
    let registry = Registry::new(3);

    registry.add_task(task("a", &[]))?;
    registry.add_task(task("b", &["a"]))?;

    let err = registry.remove_task("a").unwrap_err();
    match err {
        TaskmasterError::TaskInUse { task, dependents } => {
            assert_eq!(task, "A");
            assert_eq!(dependents, vec!["B".to_string()]);
        }
        other => panic!("expected task-in-use, got {other:?}"),
    }
    assert!(registry.contains("a"));

    // Removing the dependent first unblocks the requirement.
    registry.remove_task("b")?;
    registry.remove_task("a")?;
    assert!(registry.is_empty());

    Ok(())
}

#[test]
fn removal_is_refused_while_running() -> TestResult {
    init_tracing();
    let registry = Registry::new(3);

    let a = registry.add_task(task("a", &[]))?;
    a.enable();
    a.started();

    let err = registry.remove_task("a").unwrap_err();
    assert!(matches!(err, TaskmasterError::TaskStillRunning(name) if name == "A"));

    a.disable();
    a.stopped();
    registry.remove_task("a")?;

    Ok(())
}

#[test]
fn removing_an_unknown_task_fails() {
    init_tracing();
    let registry = Registry::new(3);
    assert!(matches!(
        registry.remove_task("ghost"),
        Err(TaskmasterError::TaskNotFound(_))
    ));
}

#[test]
fn builds_from_config_in_dependency_order() -> TestResult {
    init_tracing();

    // BTreeMap iteration would visit "a_worker" before its requirement
    // "z_logger"; from_config must still resolve it.
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "a_worker",
            TaskConfigBuilder::new()
                .command("worker-bin")
                .requires("z_logger")
                .must_start(true)
                .build(),
        )
        .with_task("z_logger", TaskConfigBuilder::new().command("logger-bin").build())
        .build();

    let registry = Registry::from_config(&cfg, &PayloadStore::new())?;
    assert_eq!(registry.len(), 2);

    let worker = registry.get("a_worker").unwrap();
    assert!(worker.snapshot().must_start);
    assert_eq!(worker.requires(), ["Z_LOGGER"]);
    assert!(!registry.get("z_logger").unwrap().snapshot().must_start);

    Ok(())
}

#[test]
fn config_payload_without_loaded_bytes_is_an_error() {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new().payload("payloads/a").build())
        .build();

    // Empty store: the config references bytes nobody loaded.
    let err = Registry::from_config(&cfg, &PayloadStore::new()).unwrap_err();
    assert!(matches!(err, TaskmasterError::ConfigError(_)));
}
