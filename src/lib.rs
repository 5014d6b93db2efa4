// src/lib.rs

//! taskmaster: a single-host process orchestrator.
//!
//! A master process supervises a set of named worker tasks with declared
//! start-up dependencies. Each task's desired state is driven toward its
//! observed state by a fixed-tick reconciliation loop; confirmations and
//! operator requests arrive as verb messages over a publish/subscribe
//! control plane. Workers with embedded payloads are launched straight
//! from memory without touching persistent storage.

pub mod bus;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod payloads;
pub mod proc;
pub mod task;
pub mod worker;

use std::fs;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::bus::{BusSender, MemoryBus, MessageBus};
use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::engine::{Reconciler, Router};
use crate::errors::Result;
use crate::payloads::PayloadStore;
use crate::proc::launcher::WorkerEnv;
use crate::task::Registry;

/// Orchestrator entry point: load config, wire up the control plane, and
/// run the reconciliation loop until the system settles or shuts down.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::load_and_validate(&args.config)?;

    let tick_interval = match &args.tick_interval {
        Some(s) => config::parse_duration(s)?,
        None => cfg.tick_interval()?,
    };

    if args.dry_run {
        print_task_table(&cfg);
        return Ok(());
    }

    let payloads = PayloadStore::load_from_config(&cfg)?;
    let registry = Arc::new(Registry::from_config(&cfg, &payloads)?);
    info!(tasks = registry.len(), "registry built");

    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());

    // Spawned workers find the bus through this well-known file.
    fs::write(&cfg.master.port_file, MemoryBus::ENDPOINT)?;
    info!(
        port_file = %cfg.master.port_file.display(),
        endpoint = MemoryBus::ENDPOINT,
        "bus endpoint published"
    );

    let router = Router::new(registry.clone(), bus.clone());
    tokio::spawn(async move {
        if let Err(err) = router.run().await {
            warn!(error = %err, "control router exited with error");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx);

    let worker_env = WorkerEnv {
        log_level: cfg.master.worker_log_level.clone(),
        log_size_limit: cfg.master.worker_log_size_limit,
        port_file: cfg.master.port_file.clone(),
    };

    let reconciler = Reconciler::new(
        registry,
        Arc::new(BusSender::new(bus)),
        worker_env,
        tick_interval,
        cfg.grace_period()?,
        cfg.drain_timeout()?,
        shutdown_rx,
    );

    let result = reconciler.run().await;

    if let Err(err) = fs::remove_file(&cfg.master.port_file) {
        warn!(
            port_file = %cfg.master.port_file.display(),
            error = %err,
            "could not remove bus endpoint file"
        );
    }

    result
}

/// Flip the shutdown signal on SIGINT or SIGTERM.
fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(err) => {
                    warn!(error = %err, "cannot install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = shutdown_tx.send(true);
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                _ = term.recv() => info!("termination signal received"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received");
        }

        let _ = shutdown_tx.send(true);
    });
}

fn print_task_table(cfg: &ConfigFile) {
    println!("master:");
    println!("  tick_interval     = {}", cfg.master.tick_interval);
    println!("  kill_attempts     = {}", cfg.master.kill_attempts);
    println!("  grace_period      = {}", cfg.master.grace_period);
    println!("  drain_timeout     = {}", cfg.master.drain_timeout);
    println!("  port_file         = {}", cfg.master.port_file.display());
    println!();

    for (name, tc) in cfg.task.iter() {
        println!("task {name}:");
        println!("  must_start = {}", tc.must_start);
        if !tc.requires.is_empty() {
            println!("  requires   = {}", tc.requires.join(", "));
        }
        if let Some(command) = &tc.command {
            if tc.args.is_empty() {
                println!("  command    = {command}");
            } else {
                println!("  command    = {command} {}", tc.args.join(" "));
            }
        }
        if let Some(payload) = &tc.payload {
            println!("  payload    = {}", payload.display());
        }
        for (key, value) in tc.env.iter() {
            println!("  env        = {key}={value}");
        }
    }
}
