// src/monitor/listener.rs

//! Observer traits.
//!
//! [`TaskStatusListener`] is called from whichever thread ran the task and
//! must be thread-safe. [`MonitorSink`] and [`DispatcherListener`] are only
//! ever called on the scheduler's owner thread.

use std::time::Duration;

use crate::monitor::record::{ExecutionReport, TaskRunRecord};

pub trait TaskStatusListener: Send + Sync {
    /// The task has outstanding predecessors and is about to block.
    fn on_waiting(&self, _tag: &str) {}

    /// The body is about to run, after waiting `wait` for predecessors.
    fn on_starting(&self, _tag: &str, _wait: Duration) {}

    fn on_finished(&self, _record: &TaskRunRecord) {}
}

pub trait MonitorSink: Send {
    /// Whether [`MonitorSink::on_sorted`] should receive the order dump.
    fn wants_sorted_summary(&self) -> bool {
        false
    }

    fn on_sorted(&mut self, _summary: &str) {}

    /// Caller-thread time spent in `start()`, reported when it returns.
    fn on_caller_thread_cost(&mut self, _cost: Duration) {}

    /// Delivered exactly once, after the final task completed.
    fn on_report(&mut self, report: &ExecutionReport);
}

pub trait DispatcherListener: Send {
    /// Called by `start()` before anything is dispatched.
    fn on_start_before(&mut self) {}

    /// Called after the report has been delivered.
    fn on_finish(&mut self) {}
}

/// Sink that logs the report through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MonitorSink for LogSink {
    fn on_report(&mut self, report: &ExecutionReport) {
        tracing::info!(
            tasks = report.tasks.len(),
            skipped = report.skipped.len(),
            caller_wait_timed_out = report.caller_wait_timed_out,
            "startup tasks finished\n{report}"
        );
    }
}

/// Sink that prints the report to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl MonitorSink for StdoutSink {
    fn on_caller_thread_cost(&mut self, cost: Duration) {
        println!("start() returned after {:.2} ms", cost.as_secs_f64() * 1000.0);
    }

    fn on_report(&mut self, report: &ExecutionReport) {
        println!("{report}");
    }
}
