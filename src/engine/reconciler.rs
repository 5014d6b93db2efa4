// src/engine/reconciler.rs

//! The fixed-tick reconciliation loop.
//!
//! Every tick re-evaluates each task's (desired, transitional, observed)
//! triple against the case table below and acts on mismatches; afterwards
//! it checks whether the whole system is ready for a graceful exit. The
//! loop never blocks on process I/O: launches hand off to a waiter task,
//! stops are signal sends, and inbound control messages mutate task state
//! on their own execution context between ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bus::BusSender;
use crate::errors::Result;
use crate::proc::launcher::{launch, WorkerEnv};
use crate::proc::supervisor;
use crate::task::resolver::{ready_to_work, recursive_enable, recursive_stop};
use crate::task::task::Task;
use crate::task::Registry;

pub struct Reconciler {
    registry: Arc<Registry>,
    sender: Arc<BusSender>,
    worker_env: WorkerEnv,
    tick_interval: Duration,
    grace_period: Duration,
    drain_timeout: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        sender: Arc<BusSender>,
        worker_env: WorkerEnv,
        tick_interval: Duration,
        grace_period: Duration,
        drain_timeout: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            sender,
            worker_env,
            tick_interval,
            grace_period,
            drain_timeout,
            shutdown_rx,
        }
    }

    /// Main loop. Returns once every task is confirmed stopped (after the
    /// grace period), or once a cooperative shutdown exceeds its bound.
    pub async fn run(mut self) -> Result<()> {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            "reconciler started"
        );

        let mut tick = interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut draining = false;
        let mut drain_deadline = Instant::now();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if self.reconcile_once().await {
                        info!(
                            grace_ms = self.grace_period.as_millis() as u64,
                            "all tasks settled; exiting after grace period"
                        );
                        tokio::time::sleep(self.grace_period).await;
                        return Ok(());
                    }
                }

                changed = self.shutdown_rx.changed(), if !draining => {
                    if changed.is_err() || !*self.shutdown_rx.borrow() {
                        continue;
                    }
                    warn!("cooperative shutdown requested; disabling all tasks");
                    for task in self.registry.tasks() {
                        recursive_stop(&self.registry, &task);
                    }
                    draining = true;
                    drain_deadline = Instant::now() + self.drain_timeout;
                }

                _ = tokio::time::sleep_until(drain_deadline), if draining => {
                    warn!("shutdown bound expired before all tasks confirmed stopped; forcing exit");
                    return Ok(());
                }
            }
        }
    }

    /// One reconciliation pass over every task. Returns `true` when the
    /// system is ready for a graceful exit: nothing is desired, observed
    /// matches desired everywhere, and no supervised process remains alive.
    pub async fn reconcile_once(&self) -> bool {
        let tasks = self.registry.tasks();

        for task in &tasks {
            let s = task.snapshot();
            debug!(
                task = %task.name(),
                must_start = s.must_start,
                in_progress = s.in_progress,
                launched = s.launched,
                reminder = s.reminder,
                "tick"
            );
            self.reconcile_task(task).await;
        }

        self.ready_to_exit().await
    }

    async fn reconcile_task(&self, task: &Arc<Task>) {
        // A requirement removed from the registry while this task depends
        // on it invalidates the task: cancel it and its dependents.
        for dep in task.requires() {
            if !self.registry.contains(dep) {
                warn!(
                    task = %task.name(),
                    requirement = %dep,
                    "required task vanished from registry; cancelling"
                );
                recursive_stop(&self.registry, task);
                return;
            }
        }

        let s = task.snapshot();
        match (s.must_start, s.in_progress, s.launched) {
            // Wanted, transition open, observed running: the start never
            // settled — treat as stuck and remind it to stop.
            (true, true, true) => {
                debug!(task = %task.name(), "start unsettled while observed; sending stop reminder");
                task.stop();
            }
            // Wanted, transition open, not yet confirmed: keep reminding;
            // an unconfirmable process escalates toward a kill.
            (true, true, false) => {
                task.stop();
            }
            // Wanted and idle: launch when the gate is open, otherwise pull
            // requirements up first.
            (true, false, false) => {
                if ready_to_work(&self.registry, task) {
                    if task.spec().is_none() {
                        error!(task = %task.name(), "no way to launch this task; propagating failure");
                        recursive_stop(&self.registry, task);
                        return;
                    }
                    info!(task = %task.name(), "launching");
                    if let Err(err) = launch(task.clone(), &self.worker_env).await {
                        warn!(task = %task.name(), error = %err, "launch failed");
                    }
                } else {
                    recursive_enable(&self.registry, task);
                }
            }
            // Steady running state; if requirements fell out from under it,
            // re-enable them and force this task down hard.
            (true, false, true) => {
                if !ready_to_work(&self.registry, task) {
                    warn!(
                        task = %task.name(),
                        "requirements no longer satisfied; force-stopping"
                    );
                    recursive_enable(&self.registry, task);
                    task.escalate();
                    task.stop();
                }
            }
            // Fully stopped.
            (false, false, false) => {}
            // Must stop: first attempt or escalating reminder.
            (false, false, true) => {
                debug!(task = %task.name(), "observed running but unwanted; stopping");
                task.stop();
            }
            // Stop in progress, unconfirmed: re-invoke to escalate.
            (false, true, true) => {
                debug!(task = %task.name(), "stop unsettled; sending stop reminder");
                task.stop();
            }
            // Transition open but already unobserved: settle it.
            (false, true, false) => {
                task.stop();
            }
        }
    }

    async fn ready_to_exit(&self) -> bool {
        for task in self.registry.tasks() {
            let s = task.snapshot();
            if s.must_start || s.launched != s.must_start {
                debug!(task = %task.name(), "still in work; not ready to exit");
                return false;
            }
            if s.has_process && supervisor::check(&task, &self.sender).await {
                debug!(task = %task.name(), "process still alive; not ready to exit");
                return false;
            }
        }
        true
    }
}
