// src/task/resolver.rs

//! Dependency-graph propagation.
//!
//! Enabling walks upstream (toward requirements) so a wanted task
//! transitively wants everything it needs; stopping walks downstream
//! (toward dependents) so stopping a prerequisite never leaves a dependent
//! running unsupported. Both walks are iterative with a visited set:
//! cycles are rejected at registration time, but a corrupt registry must
//! not be able to loop the reconciler.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::task::registry::Registry;
use crate::task::task::{Task, TaskName};

/// True iff every requirement of `task` is both wanted and confirmed
/// running. This is the gate in front of every launch.
pub fn ready_to_work(registry: &Registry, task: &Task) -> bool {
    for dep in task.requires() {
        let satisfied = registry
            .get(dep)
            .map(|d| {
                let s = d.snapshot();
                s.must_start && s.launched
            })
            .unwrap_or(false);

        if !satisfied {
            return false;
        }
    }
    debug!(task = %task.name(), "ready to work");
    true
}

/// Enable `root` and, transitively, every not-yet-wanted requirement.
pub fn recursive_enable(registry: &Registry, root: &Arc<Task>) {
    let mut visited: HashSet<TaskName> = HashSet::new();
    let mut queue: VecDeque<Arc<Task>> = VecDeque::from([root.clone()]);

    while let Some(task) = queue.pop_front() {
        if !visited.insert(task.name().clone()) {
            continue;
        }
        task.enable();

        for dep in task.requires() {
            if let Some(dep_task) = registry.get(dep) {
                if !dep_task.snapshot().must_start {
                    info!(
                        task = %task.name(),
                        requirement = %dep_task.name(),
                        "enabling requirement"
                    );
                    queue.push_back(dep_task);
                }
            }
        }
    }
}

/// Disable and stop `root` and, transitively, every task that requires it,
/// directly or through intermediaries.
pub fn recursive_stop(registry: &Registry, root: &Arc<Task>) {
    let mut visited: HashSet<TaskName> = HashSet::new();
    let mut queue: VecDeque<Arc<Task>> = VecDeque::from([root.clone()]);

    while let Some(task) = queue.pop_front() {
        if !visited.insert(task.name().clone()) {
            continue;
        }
        task.disable();
        task.stop();

        for dependent in registry.tasks() {
            if dependent.requires().contains(task.name()) {
                info!(
                    task = %task.name(),
                    dependent = %dependent.name(),
                    "stopping dependent"
                );
                queue.push_back(dependent);
            }
        }
    }
}
