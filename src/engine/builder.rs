// src/engine/builder.rs

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::dag::{GraphBuilder, TopologicalSorter, describe_order};
use crate::engine::Scheduler;
use crate::errors::{BootdagError, Result};
use crate::exec::runner::{RunState, TaskSlot};
use crate::exec::{ExecutorBackend, WorkerPool};
use crate::monitor::{
    DispatcherListener, ExecutionMonitor, LogSink, MonitorSink, TaskStatusListener,
};
use crate::task::Task;
use crate::types::{ProcessRole, TaskTag};

/// Assembles a [`Scheduler`].
///
/// The process role is detected once, when the builder is created, and can
/// be overridden with [`SchedulerBuilder::process_role`].
pub struct SchedulerBuilder {
    graph: GraphBuilder,
    config: SchedulerConfig,
    pool: Option<Arc<dyn ExecutorBackend>>,
    status_listener: Option<Box<dyn TaskStatusListener>>,
    monitor_sink: Option<Box<dyn MonitorSink>>,
    dispatcher_listener: Option<Box<dyn DispatcherListener>>,
    owner: Option<ThreadId>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            graph: GraphBuilder::new(),
            config: SchedulerConfig::default(),
            pool: None,
            status_listener: None,
            monitor_sink: None,
            dispatcher_listener: None,
            owner: None,
        }
    }

    pub fn add_task(&mut self, task: impl Into<Task>) -> Result<&mut Self> {
        self.graph.add_task(task.into())?;
        Ok(self)
    }

    pub fn add_anchor<I, S>(&mut self, tag: impl Into<TaskTag>, predecessors: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        self.graph.add_anchor(tag, predecessors)?;
        Ok(self)
    }

    /// Attach predecessors to an already added task.
    pub fn add_dependency<I, S>(&mut self, tag: &str, predecessors: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        self.graph.add_dependency(tag, predecessors)?;
        Ok(self)
    }

    pub fn config(&mut self, config: SchedulerConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn worker_pool(&mut self, pool: Arc<dyn ExecutorBackend>) -> &mut Self {
        self.pool = Some(pool);
        self
    }

    /// Start a [`WorkerPool`] sized from the current configuration.
    pub fn default_worker_pool(&mut self) -> Result<&mut Self> {
        let pool = WorkerPool::new(self.config.worker_threads, self.config.queue_capacity)?;
        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    pub fn status_listener(&mut self, listener: impl TaskStatusListener + 'static) -> &mut Self {
        self.status_listener = Some(Box::new(listener));
        self
    }

    /// Defaults to [`LogSink`].
    pub fn monitor_sink(&mut self, sink: impl MonitorSink + 'static) -> &mut Self {
        self.monitor_sink = Some(Box::new(sink));
        self
    }

    pub fn dispatcher_listener(&mut self, listener: impl DispatcherListener + 'static) -> &mut Self {
        self.dispatcher_listener = Some(Box::new(listener));
        self
    }

    pub fn process_role(&mut self, role: ProcessRole) -> &mut Self {
        self.config.process_role = role;
        self
    }

    /// Thread allowed to call `start()`. Defaults to the thread calling
    /// [`SchedulerBuilder::build`].
    pub fn owner_thread(&mut self, owner: ThreadId) -> &mut Self {
        self.owner = Some(owner);
        self
    }

    pub fn caller_wait_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.caller_wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn task_wait_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.task_wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Finalize and sort the graph.
    ///
    /// Fails on unknown or self dependencies, duplicate tags, cycles, and on
    /// worker-thread tasks without a worker pool. Nothing is dispatched.
    pub fn build(self) -> Result<Scheduler> {
        let graph = self.graph.finalize()?;
        let sorted = TopologicalSorter::sort(&graph)?;

        let monitor = ExecutionMonitor::new();
        monitor.record_sort_duration(sorted.elapsed);

        let mut sink = self.monitor_sink.unwrap_or_else(|| Box::new(LogSink));
        let summary = describe_order(&graph, &sorted.order);
        debug!("{summary}");
        if sink.wants_sorted_summary() {
            sink.on_sorted(&summary);
        }

        let needs_pool = graph.tasks().iter().any(|t| !t.runs_on_caller_thread());
        if needs_pool && self.pool.is_none() {
            return Err(BootdagError::MissingWorkerPool);
        }

        let blocking = graph.blocking_count();
        let dependents: Vec<Vec<usize>> = graph
            .tasks()
            .iter()
            .map(|t| graph.dependents_of(t.tag()).to_vec())
            .collect();
        let slots: Vec<TaskSlot> = graph
            .into_tasks()
            .into_iter()
            .zip(dependents)
            .map(|(task, deps)| TaskSlot::new(task, deps))
            .collect();

        info!(
            tasks = slots.len(),
            blocking,
            promoted = sorted.promoted,
            role = ?self.config.process_role,
            "scheduler built"
        );

        let run = RunState::new(
            slots,
            monitor,
            self.status_listener,
            self.config.task_wait_timeout(),
        );

        Ok(Scheduler::new(
            run,
            sorted.order,
            blocking,
            self.pool,
            sink,
            self.dispatcher_listener,
            self.owner.unwrap_or_else(|| thread::current().id()),
            self.config.process_role,
            self.config.caller_wait_timeout(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_tasks_require_a_pool() {
        let mut builder = SchedulerBuilder::new();
        builder.add_task(Task::new("net", || {})).unwrap();
        assert!(matches!(builder.build(), Err(BootdagError::MissingWorkerPool)));
    }

    #[test]
    fn caller_only_graph_needs_no_pool() {
        let mut builder = SchedulerBuilder::new();
        builder
            .add_task(Task::new("ui", || {}).on_caller_thread())
            .unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn cycle_is_reported_at_build() {
        let mut builder = SchedulerBuilder::new();
        builder
            .add_task(Task::new("a", || {}).on_caller_thread().after(["b"]))
            .unwrap()
            .add_task(Task::new("b", || {}).on_caller_thread().after(["a"]))
            .unwrap();
        assert!(matches!(builder.build(), Err(BootdagError::DagCycle(_))));
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let mut builder = SchedulerBuilder::new();
        builder
            .add_task(Task::new("a", || {}).on_caller_thread())
            .unwrap()
            .add_task(Task::new("a", || {}).on_caller_thread())
            .unwrap();
        assert!(matches!(builder.build(), Err(BootdagError::DuplicateTag(t)) if t == "a"));
    }

    #[test]
    fn sorted_summary_reaches_interested_sink() {
        struct Capture(Arc<parking_lot::Mutex<Option<String>>>);
        impl MonitorSink for Capture {
            fn wants_sorted_summary(&self) -> bool {
                true
            }
            fn on_sorted(&mut self, summary: &str) {
                *self.0.lock() = Some(summary.to_string());
            }
            fn on_report(&mut self, _report: &crate::monitor::ExecutionReport) {}
        }

        let seen = Arc::new(parking_lot::Mutex::new(None));
        let mut builder = SchedulerBuilder::new();
        builder
            .add_task(Task::new("a", || {}).on_caller_thread())
            .unwrap()
            .monitor_sink(Capture(Arc::clone(&seen)));
        builder.build().unwrap();

        let summary = seen.lock().clone().expect("summary delivered");
        assert!(summary.starts_with("task sort list:"));
    }
}
