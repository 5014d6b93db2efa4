// src/task/registry.rs

//! Name-keyed task registry.
//!
//! The registry lock only serializes structural mutation (add/remove)
//! against iteration; each task's mutable state has its own lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info};

use crate::bus::channel_for;
use crate::config::ConfigFile;
use crate::errors::{Result, TaskmasterError};
use crate::payloads::PayloadStore;
use crate::task::task::{LaunchSpec, Task, TaskName};

#[derive(Debug)]
pub struct Registry {
    tasks: RwLock<HashMap<TaskName, Arc<Task>>>,
    kill_attempts: u32,
}

impl Registry {
    pub fn new(kill_attempts: u32) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            kill_attempts: kill_attempts.max(1),
        }
    }

    /// Escalation threshold applied to tasks built through this registry.
    pub fn kill_attempts(&self) -> u32 {
        self.kill_attempts
    }

    /// Build a registry from a validated config plus the payload store.
    ///
    /// Tasks are inserted in dependency order so every `requires` reference
    /// resolves at registration time.
    pub fn from_config(cfg: &ConfigFile, payloads: &PayloadStore) -> Result<Self> {
        let registry = Self::new(cfg.master.kill_attempts);

        for name in insertion_order(cfg)? {
            let tc = &cfg.task[&name];

            let spec = if let Some(program) = &tc.command {
                Some(LaunchSpec::Command {
                    program: program.clone(),
                    args: tc.args.clone(),
                })
            } else if tc.payload.is_some() {
                let bytes = payloads.get(&name).ok_or_else(|| {
                    TaskmasterError::ConfigError(format!(
                        "task '{name}' declares a payload but no bytes were loaded"
                    ))
                })?;
                Some(LaunchSpec::InMemory {
                    payload: bytes.to_vec(),
                })
            } else {
                None
            };

            let env: Vec<(String, String)> = tc
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            registry.add_task(Task::new(
                &name,
                tc.requires.clone(),
                spec,
                env,
                tc.must_start,
                cfg.master.kill_attempts,
            ))?;
        }

        Ok(registry)
    }

    /// Register a task.
    ///
    /// Fails on duplicate names, on `requires` references that are not
    /// already registered, and on additions that would close a dependency
    /// cycle. The registry is left unchanged on failure.
    pub fn add_task(&self, task: Task) -> Result<Arc<Task>> {
        let mut tasks = self.tasks.write().unwrap();
        let name = task.name().clone();

        if tasks.contains_key(&name) {
            return Err(TaskmasterError::DuplicateTask(name));
        }

        for dep in task.requires() {
            if !tasks.contains_key(dep) {
                return Err(TaskmasterError::UnknownDependency {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        ensure_acyclic(&tasks, &task)?;

        let task = Arc::new(task);
        tasks.insert(name.clone(), task.clone());
        info!(task = %name, "task registered");
        Ok(task)
    }

    /// Remove a task.
    ///
    /// Refused while the task is confirmed running or while any other task
    /// lists it as a requirement; the registry is left unchanged on failure.
    pub fn remove_task(&self, name: &str) -> Result<()> {
        let name = channel_for(name);
        let mut tasks = self.tasks.write().unwrap();

        let task = tasks
            .get(&name)
            .ok_or_else(|| TaskmasterError::TaskNotFound(name.clone()))?;

        if task.snapshot().launched {
            return Err(TaskmasterError::TaskStillRunning(name));
        }

        let dependents: Vec<TaskName> = tasks
            .values()
            .filter(|t| t.requires().contains(&name))
            .map(|t| t.name().clone())
            .collect();
        if !dependents.is_empty() {
            return Err(TaskmasterError::TaskInUse {
                task: name,
                dependents,
            });
        }

        tasks.remove(&name);
        info!(task = %name, "task removed");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.read().unwrap().get(&channel_for(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.read().unwrap().contains_key(&channel_for(name))
    }

    /// Snapshot of all registered tasks.
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.tasks.read().unwrap().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<TaskName> {
        self.tasks.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().unwrap().is_empty()
    }
}

/// Reject registrations that would make the requirement graph cyclic.
///
/// Config-driven setups are already checked in `config::validate`; this
/// guards the dynamic `add_task` path the same way.
fn ensure_acyclic(existing: &HashMap<TaskName, Arc<Task>>, candidate: &Task) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (name, task) in existing.iter() {
        graph.add_node(name.as_str());
        for dep in task.requires() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }
    graph.add_node(candidate.name().as_str());
    for dep in candidate.requires() {
        graph.add_edge(dep.as_str(), candidate.name().as_str(), ());
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(TaskmasterError::DependencyCycle(format!(
            "registering '{}' would close a cycle involving '{}'",
            candidate.name(),
            cycle.node_id()
        ))),
    }
}

/// Dependency-respecting insertion order for the config's tasks, keyed by
/// the config's own (pre-normalization) names.
fn insertion_order(cfg: &ConfigFile) -> Result<Vec<TaskName>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }
    for (name, tc) in cfg.task.iter() {
        for dep in tc.requires.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        TaskmasterError::DependencyCycle(format!(
            "cycle in task requirements involving '{}'",
            cycle.node_id()
        ))
    })?;

    debug!(tasks = order.len(), "computed registration order");
    Ok(order.into_iter().map(|n| n.to_string()).collect())
}
