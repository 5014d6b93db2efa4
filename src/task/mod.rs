// src/task/mod.rs

//! The unit of supervision and its registry.

pub mod registry;
pub mod resolver;
#[allow(clippy::module_inception)]
pub mod task;

pub use registry::Registry;
pub use task::{LaunchSpec, ProcessHandle, StateSnapshot, Task, TaskName};
