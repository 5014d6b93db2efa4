// tests/resolver.rs

use std::error::Error;

use taskmaster::task::resolver::{ready_to_work, recursive_enable, recursive_stop};
use taskmaster::task::{Registry, Task};
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

/// logger <- db <- worker
fn chain_registry() -> Registry {
    let registry = Registry::new(3);
    registry.add_task(task("logger", &[])).unwrap();
    registry.add_task(task("db", &["logger"])).unwrap();
    registry.add_task(task("worker", &["db"])).unwrap();
    registry
}

#[test]
fn launch_gate_requires_confirmed_requirements() -> TestResult {
    init_tracing();
    let registry = chain_registry();
    let db = registry.get("db").unwrap();
    let logger = registry.get("logger").unwrap();

    // Wanted but unconfirmed requirement: gate stays closed.
    logger.enable();
    assert!(!ready_to_work(&registry, &db));

    // Confirmed requirement opens the gate.
    logger.started();
    assert!(ready_to_work(&registry, &db));

    // A requirement that is running but no longer wanted closes it again.
    logger.disable();
    assert!(!ready_to_work(&registry, &db));

    // A task with no requirements is always ready.
    assert!(ready_to_work(&registry, &logger));

    Ok(())
}

#[test]
fn enabling_a_task_pulls_its_requirement_chain_up() -> TestResult {
    init_tracing();
    let registry = chain_registry();
    let worker = registry.get("worker").unwrap();

    recursive_enable(&registry, &worker);

    for name in ["worker", "db", "logger"] {
        assert!(
            registry.get(name).unwrap().snapshot().must_start,
            "{name} should be wanted"
        );
    }

    Ok(())
}

#[test]
fn enabling_does_not_touch_unrelated_tasks() -> TestResult {
    init_tracing();
    let registry = chain_registry();
    registry.add_task(task("bystander", &[])).unwrap();

    let db = registry.get("db").unwrap();
    recursive_enable(&registry, &db);

    assert!(registry.get("logger").unwrap().snapshot().must_start);
    assert!(!registry.get("worker").unwrap().snapshot().must_start);
    assert!(!registry.get("bystander").unwrap().snapshot().must_start);

    Ok(())
}

#[test]
fn stopping_a_requirement_cascades_to_dependents() -> TestResult {
    init_tracing();
    let registry = chain_registry();

    // Bring the whole chain to confirmed-running.
    for name in ["logger", "db", "worker"] {
        let t = registry.get(name).unwrap();
        t.enable();
        t.started();
    }

    let logger = registry.get("logger").unwrap();
    recursive_stop(&registry, &logger);

    for name in ["logger", "db", "worker"] {
        let s = registry.get(name).unwrap().snapshot();
        assert!(!s.must_start, "{name} should be unwanted");
        // No process handles in this registry, so the stop attempt
        // resynchronizes each task straight to stopped.
        assert!(!s.launched, "{name} should be confirmed stopped");
    }

    Ok(())
}

#[test]
fn stopping_a_leaf_leaves_requirements_running() -> TestResult {
    init_tracing();
    let registry = chain_registry();

    for name in ["logger", "db", "worker"] {
        let t = registry.get(name).unwrap();
        t.enable();
        t.started();
    }

    let worker = registry.get("worker").unwrap();
    recursive_stop(&registry, &worker);

    assert!(!worker.snapshot().must_start);
    assert!(registry.get("db").unwrap().snapshot().must_start);
    assert!(registry.get("logger").unwrap().snapshot().must_start);

    Ok(())
}

#[test]
fn stop_cascade_visits_diamond_dependents_once() -> TestResult {
    init_tracing();
    let registry = Registry::new(3);
    registry.add_task(task("base", &[])).unwrap();
    registry.add_task(task("left", &["base"])).unwrap();
    registry.add_task(task("right", &["base"])).unwrap();
    registry.add_task(task("top", &["left", "right"])).unwrap();

    for name in ["base", "left", "right", "top"] {
        let t = registry.get(name).unwrap();
        t.enable();
        t.started();
    }

    let base = registry.get("base").unwrap();
    recursive_stop(&registry, &base);

    for name in ["base", "left", "right", "top"] {
        assert!(!registry.get(name).unwrap().snapshot().must_start);
    }

    Ok(())
}
