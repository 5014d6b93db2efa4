// src/engine/mod.rs

//! Orchestration engine.
//!
//! Two long-lived execution contexts share the task registry:
//! - the [`reconciler`] drives every task's observed state toward its
//!   desired state on a fixed tick and detects global shutdown readiness;
//! - the [`router`] consumes inbound control messages and applies them to
//!   task state through the same locks.

pub mod reconciler;
pub mod router;

pub use reconciler::Reconciler;
pub use router::Router;
