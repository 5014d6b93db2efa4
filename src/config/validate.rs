// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::parse_duration;
use crate::errors::{Result, TaskmasterError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskmasterError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.master, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_master_section(cfg)?;
    validate_requires(cfg)?;
    validate_launch_specs(cfg)?;
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskmasterError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_master_section(cfg: &RawConfigFile) -> Result<()> {
    parse_duration(&cfg.master.tick_interval)?;
    parse_duration(&cfg.master.grace_period)?;
    parse_duration(&cfg.master.drain_timeout)?;

    if cfg.master.kill_attempts == 0 {
        return Err(TaskmasterError::ConfigError(
            "[master].kill_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_requires(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.requires.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(TaskmasterError::UnknownDependency {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            }
            if dep == name {
                return Err(TaskmasterError::ConfigError(format!(
                    "task '{name}' cannot require itself"
                )));
            }
        }
    }
    Ok(())
}

fn validate_launch_specs(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.command.is_some() && task.payload.is_some() {
            return Err(TaskmasterError::ConfigError(format!(
                "task '{name}' declares both `command` and `payload`; pick one"
            )));
        }
        if task.must_start && !task.has_launch_spec() {
            return Err(TaskmasterError::ConfigError(format!(
                "task '{name}' has must_start = true but neither `command` nor `payload`"
            )));
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    // Build a petgraph graph from the tasks and their requirements.
    //
    // Edge direction: requirement -> task. For:
    //   [task.B]
    //   requires = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.requires.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort fails exactly when there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(TaskmasterError::DependencyCycle(format!(
                "cycle in task requirements involving task '{node}'"
            )))
        }
    }
}
