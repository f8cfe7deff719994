// src/monitor/mod.rs

//! Execution monitoring.
//!
//! [`ExecutionMonitor`] collects timing samples from any thread during one
//! dispatch cycle and assembles the [`ExecutionReport`] handed to the
//! [`MonitorSink`].

pub mod listener;
pub mod record;

use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub use listener::{DispatcherListener, LogSink, MonitorSink, StdoutSink, TaskStatusListener};
pub use record::{ExecutionReport, SkipReason, SkippedTask, TaskOutcome, TaskRunRecord};

#[derive(Debug, Default)]
struct MonitorState {
    sort_duration: Duration,
    dispatch_start: Option<Instant>,
    caller_tasks_cost: Duration,
    barrier_tracked: usize,
    caller_wait: Duration,
    caller_wait_timed_out: bool,
    caller_thread_cost: Duration,
    all_tasks_elapsed: Option<Duration>,
    tasks: Vec<TaskRunRecord>,
    skipped: Vec<SkippedTask>,
}

#[derive(Debug, Default)]
pub struct ExecutionMonitor {
    state: Mutex<MonitorState>,
}

impl ExecutionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sort_duration(&self, d: Duration) {
        self.state.lock().sort_duration = d;
    }

    pub fn record_dispatch_start(&self) {
        self.state.lock().dispatch_start = Some(Instant::now());
    }

    pub fn record_task_execution(&self, record: TaskRunRecord) {
        self.state.lock().tasks.push(record);
    }

    pub fn record_skipped(&self, tag: &str, reason: SkipReason) {
        self.state.lock().skipped.push(SkippedTask {
            tag: tag.to_string(),
            reason,
        });
    }

    pub fn record_caller_tasks(&self, cost: Duration) {
        self.state.lock().caller_tasks_cost = cost;
    }

    pub fn record_barrier_tracked(&self, count: usize) {
        self.state.lock().barrier_tracked = count;
    }

    pub fn record_caller_barrier_wait(&self, d: Duration, timed_out: bool) {
        let mut st = self.state.lock();
        st.caller_wait = d;
        st.caller_wait_timed_out = timed_out;
    }

    /// Caller-thread time from dispatch start until now.
    pub fn record_caller_thread_cost(&self) -> Duration {
        let mut st = self.state.lock();
        let cost = st.dispatch_start.map(|s| s.elapsed()).unwrap_or_default();
        st.caller_thread_cost = cost;
        cost
    }

    pub fn record_all_finished(&self) {
        let mut st = self.state.lock();
        st.all_tasks_elapsed = Some(st.dispatch_start.map(|s| s.elapsed()).unwrap_or_default());
    }

    pub fn report(&self) -> ExecutionReport {
        let st = self.state.lock();
        ExecutionReport {
            sort_duration: st.sort_duration,
            caller_thread_cost: st.caller_thread_cost,
            caller_tasks_cost: st.caller_tasks_cost,
            barrier_tracked: st.barrier_tracked,
            caller_wait: st.caller_wait,
            caller_wait_timed_out: st.caller_wait_timed_out,
            all_tasks_elapsed: st.all_tasks_elapsed.unwrap_or_default(),
            tasks: st.tasks.clone(),
            skipped: st.skipped.clone(),
        }
    }
}
