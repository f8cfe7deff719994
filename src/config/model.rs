// src/config/model.rs

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::trace;

use crate::engine::SchedulerBuilder;
use crate::errors::Result;
use crate::exec::{DEFAULT_QUEUE_CAPACITY, WorkerPool};
use crate::task::Task;
use crate::types::{ProcessRole, ThreadAffinity};

/// Scheduler settings, also the `[config]` section of a manifest.
///
/// ```toml
/// [config]
/// worker_threads = 4
/// queue_capacity = 256
/// caller_wait_timeout_ms = 10000
/// task_wait_timeout_ms = 5000
/// ```
///
/// Every field is optional. `process_role` defaults to the role detected
/// from `BOOTDAG_PROCESS_ROLE`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "WorkerPool::default_threads")]
    pub worker_threads: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound for the caller thread's wait on barrier-tracked tasks.
    #[serde(default = "default_caller_wait_timeout_ms")]
    pub caller_wait_timeout_ms: u64,

    /// Upper bound for each task's wait on its predecessors.
    #[serde(default = "default_task_wait_timeout_ms")]
    pub task_wait_timeout_ms: u64,

    #[serde(default = "ProcessRole::detect")]
    pub process_role: ProcessRole,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_caller_wait_timeout_ms() -> u64 {
    10_000
}

fn default_task_wait_timeout_ms() -> u64 {
    5_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: WorkerPool::default_threads(),
            queue_capacity: default_queue_capacity(),
            caller_wait_timeout_ms: default_caller_wait_timeout_ms(),
            task_wait_timeout_ms: default_task_wait_timeout_ms(),
            process_role: ProcessRole::detect(),
        }
    }
}

impl SchedulerConfig {
    pub fn caller_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.caller_wait_timeout_ms)
    }

    pub fn task_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.task_wait_timeout_ms)
    }
}

/// A manifest as read from TOML, before validation.
///
/// ```toml
/// [task.logging]
/// thread = "caller"
/// sleep_ms = 5
///
/// [task.network]
/// after = ["logging"]
/// block_caller = true
///
/// [anchor.core]
/// after = ["logging", "network"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawManifest {
    #[serde(default)]
    pub config: SchedulerConfig,

    /// Keys are task tags.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    #[serde(default)]
    pub anchor: BTreeMap<String, AnchorConfig>,
}

/// `[task.<tag>]` section. The body simply sleeps for `sleep_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub after: Vec<String>,

    /// `"caller"` or `"worker"` (default).
    #[serde(default)]
    pub thread: ThreadAffinity,

    #[serde(default)]
    pub sleep_ms: u64,

    #[serde(default)]
    pub block_caller: bool,

    #[serde(default)]
    pub primary_only: bool,

    #[serde(default)]
    pub promote_early: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub priority: Option<i32>,
}

fn default_enabled() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            after: Vec::new(),
            thread: ThreadAffinity::default(),
            sleep_ms: 0,
            block_caller: false,
            primary_only: false,
            promote_early: false,
            enabled: default_enabled(),
            priority: None,
        }
    }
}

/// `[anchor.<tag>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorConfig {
    #[serde(default)]
    pub after: Vec<String>,
}

/// A validated manifest. Only obtainable through `TryFrom<RawManifest>`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub config: SchedulerConfig,
    pub task: BTreeMap<String, TaskConfig>,
    pub anchor: BTreeMap<String, AnchorConfig>,
}

impl Manifest {
    pub(crate) fn new_unchecked(raw: RawManifest) -> Self {
        Self {
            config: raw.config,
            task: raw.task,
            anchor: raw.anchor,
        }
    }

    pub fn has_worker_tasks(&self) -> bool {
        self.task
            .values()
            .any(|t| t.thread == ThreadAffinity::Worker)
            || !self.anchor.is_empty()
    }

    /// Turn the manifest into a builder whose task bodies sleep.
    ///
    /// A worker pool sized from `[config]` is attached when the manifest has
    /// worker-thread tasks or anchors.
    pub fn into_builder(self) -> Result<SchedulerBuilder> {
        let needs_pool = self.has_worker_tasks();
        let mut builder = SchedulerBuilder::new();
        builder.config(self.config);

        for (tag, cfg) in self.task {
            let sleep = Duration::from_millis(cfg.sleep_ms);
            let body_tag = tag.clone();
            let mut task = Task::new(tag, move || {
                trace!(task = %body_tag, sleep_ms = sleep.as_millis() as u64, "simulated task running");
                thread::sleep(sleep);
            })
            .after(cfg.after)
            .affinity(cfg.thread)
            .block_caller(cfg.block_caller)
            .primary_only(cfg.primary_only)
            .promote_early(cfg.promote_early)
            .enabled(cfg.enabled);
            if let Some(hint) = cfg.priority {
                task = task.priority(hint);
            }
            builder.add_task(task)?;
        }

        for (tag, cfg) in self.anchor {
            builder.add_anchor(tag, cfg.after)?;
        }

        if needs_pool {
            builder.default_worker_pool()?;
        }
        Ok(builder)
    }
}
