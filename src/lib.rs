// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod monitor;
pub mod sync;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::Manifest;
use crate::config::loader::load_and_validate;
use crate::engine::Scheduler;
use crate::monitor::StdoutSink;
use crate::types::ProcessRole;

pub use crate::engine::{SchedulerBuilder, SchedulerState, StartStatus};
pub use crate::errors::BootdagError;
pub use crate::task::{StartupTask, Task};
pub use crate::types::{TaskTag, ThreadAffinity};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the manifest, applies CLI overrides, builds the
/// scheduler and either prints the dispatch order (`--dry-run`) or runs the
/// graph on the current thread and prints the report.
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut manifest = load_and_validate(&config_path)?;

    if let Some(workers) = args.workers {
        if workers == 0 {
            bail!("--workers must be >= 1");
        }
        manifest.config.worker_threads = workers;
    }
    if args.secondary {
        manifest.config.process_role = ProcessRole::Secondary;
    }

    let described = manifest.clone();
    let mut builder = manifest.into_builder()?;
    builder.monitor_sink(StdoutSink);
    let scheduler = builder.build()?;

    if args.dry_run {
        print_dry_run(&described, &scheduler);
        return Ok(());
    }

    let status = scheduler.start()?;
    debug!(?status, "start() finished");

    while !scheduler.wait_for_completion(Duration::from_secs(1))? {
        info!("waiting for remaining startup tasks");
    }
    Ok(())
}

/// Print the config and the dispatch order.
fn print_dry_run(manifest: &Manifest, scheduler: &Scheduler) {
    let cfg = &manifest.config;
    println!("bootdag dry-run");
    println!("  config.worker_threads = {}", cfg.worker_threads);
    println!("  config.queue_capacity = {}", cfg.queue_capacity);
    println!("  config.caller_wait_timeout_ms = {}", cfg.caller_wait_timeout_ms);
    println!("  config.task_wait_timeout_ms = {}", cfg.task_wait_timeout_ms);
    println!("  config.process_role = {:?}", cfg.process_role);
    println!();

    println!("dispatch order ({}):", scheduler.len());
    for tag in scheduler.sorted_tags() {
        if let Some(anchor) = manifest.anchor.get(tag) {
            println!("  - {tag} (anchor)");
            if !anchor.after.is_empty() {
                println!("      after: {:?}", anchor.after);
            }
            continue;
        }
        let Some(task) = manifest.task.get(tag) else {
            continue;
        };
        println!("  - {tag}");
        println!("      thread: {:?}", task.thread);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if task.sleep_ms > 0 {
            println!("      sleep_ms: {}", task.sleep_ms);
        }
        if task.block_caller {
            println!("      block_caller: true");
        }
        if task.primary_only {
            println!("      primary_only: true");
        }
        if task.promote_early {
            println!("      promote_early: true");
        }
        if !task.enabled {
            println!("      enabled: false");
        }
        if let Some(p) = task.priority {
            println!("      priority: {p}");
        }
    }

    debug!("dry-run complete (no execution)");
}
