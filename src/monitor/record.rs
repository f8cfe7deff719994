// src/monitor/record.rs

//! Per-task execution records and the aggregate report.

use std::fmt;
use std::thread::ThreadId;
use std::time::Duration;

use crate::types::TaskTag;

/// How a dispatched task body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The body returned (anchors always complete).
    Completed,
    /// The body panicked; the payload message if it was a string.
    Panicked(String),
}

/// One executed task.
#[derive(Debug, Clone)]
pub struct TaskRunRecord {
    pub tag: TaskTag,
    /// Time spent blocked on predecessors.
    pub wait: Duration,
    /// The predecessor wait hit its bound and the task ran anyway.
    pub wait_timed_out: bool,
    pub run: Duration,
    /// Whether the caller thread's barrier counted this task.
    pub caller_waited: bool,
    pub thread_id: ThreadId,
    pub thread_name: Option<String>,
    pub outcome: TaskOutcome,
}

/// Why a task was marked done without running its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The task, or one of its predecessors, is disabled.
    Disabled,
    /// `primary_only` task in a secondary process.
    NotPrimaryProcess,
    /// Cancelled before a worker picked it up.
    Cancelled,
    /// The worker pool refused the job.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    pub tag: TaskTag,
    pub reason: SkipReason,
}

/// Consolidated timings of one dispatch cycle.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub sort_duration: Duration,
    /// Caller-thread time spent inside `start()`.
    pub caller_thread_cost: Duration,
    /// Total run time of caller-thread tasks.
    pub caller_tasks_cost: Duration,
    /// Tasks the caller barrier was sized for.
    pub barrier_tracked: usize,
    pub caller_wait: Duration,
    pub caller_wait_timed_out: bool,
    /// From dispatch start until the last task finished.
    pub all_tasks_elapsed: Duration,
    pub tasks: Vec<TaskRunRecord>,
    pub skipped: Vec<SkippedTask>,
}

impl ExecutionReport {
    /// What running every task back to back would have cost.
    pub fn serial_cost(&self) -> Duration {
        self.tasks.iter().map(|t| t.wait + t.run).sum()
    }

    pub fn record_of(&self, tag: &str) -> Option<&TaskRunRecord> {
        self.tasks.iter().find(|t| t.tag == tag)
    }

    pub fn panicked(&self) -> impl Iterator<Item = &TaskRunRecord> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, TaskOutcome::Panicked(_)))
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for TaskRunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {}: wait {:.2} ms{}, run {:.2} ms, caller waited: {}, thread {:?} ({})",
            self.tag,
            ms(self.wait),
            if self.wait_timed_out { " (timed out)" } else { "" },
            ms(self.run),
            self.caller_waited,
            self.thread_id,
            self.thread_name.as_deref().unwrap_or("unnamed"),
        )?;
        if let TaskOutcome::Panicked(msg) = &self.outcome {
            write!(f, ", panicked: {msg}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sort cost: {:.2} ms", ms(self.sort_duration))?;
        writeln!(f, "caller thread cost: {:.2} ms", ms(self.caller_thread_cost))?;
        writeln!(f, "caller-thread tasks cost: {:.2} ms", ms(self.caller_tasks_cost))?;
        writeln!(f, "caller waited on {} task(s)", self.barrier_tracked)?;
        writeln!(
            f,
            "caller wait: {:.2} ms{}",
            ms(self.caller_wait),
            if self.caller_wait_timed_out { " (timed out)" } else { "" }
        )?;
        writeln!(f, "all tasks finished after: {:.2} ms", ms(self.all_tasks_elapsed))?;
        for record in &self.tasks {
            writeln!(f, "  {record}")?;
        }
        for skipped in &self.skipped {
            writeln!(f, "  task {} skipped: {:?}", skipped.tag, skipped.reason)?;
        }
        write!(f, "serial cost of all tasks: {:.2} ms", ms(self.serial_cost()))
    }
}
