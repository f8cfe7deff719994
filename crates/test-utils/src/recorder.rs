use std::sync::Arc;
use std::time::Duration;

use bootdag::monitor::{
    DispatcherListener, ExecutionReport, MonitorSink, TaskRunRecord, TaskStatusListener,
};
use parking_lot::Mutex;

/// One listener callback, in the order it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Waiting(String),
    Starting(String),
    Finished(String),
}

/// `TaskStatusListener` that records every callback.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<StatusEvent>>>,
    waits: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    /// Tags in the order their bodies started.
    pub fn started(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Starting(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    /// Tags in the order they finished.
    pub fn finished(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Finished(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    /// Predecessor wait passed to `on_starting` for `tag`.
    pub fn wait_of(&self, tag: &str) -> Option<Duration> {
        self.waits
            .lock()
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, wait)| *wait)
    }

    pub fn position(&self, event: &StatusEvent) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }
}

impl TaskStatusListener for RecordingListener {
    fn on_waiting(&self, tag: &str) {
        self.events.lock().push(StatusEvent::Waiting(tag.to_string()));
    }

    fn on_starting(&self, tag: &str, wait: Duration) {
        self.waits.lock().push((tag.to_string(), wait));
        self.events.lock().push(StatusEvent::Starting(tag.to_string()));
    }

    fn on_finished(&self, record: &TaskRunRecord) {
        self.events
            .lock()
            .push(StatusEvent::Finished(record.tag.clone()));
    }
}

/// Shared view into what a [`RecordingSink`] received.
#[derive(Debug, Default)]
pub struct SinkLog {
    pub sorted: Option<String>,
    pub caller_thread_cost: Option<Duration>,
    pub reports: Vec<ExecutionReport>,
    pub delivered_on: Vec<std::thread::ThreadId>,
}

/// `MonitorSink` that keeps everything it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_count(&self) -> usize {
        self.log.lock().reports.len()
    }

    pub fn last_report(&self) -> Option<ExecutionReport> {
        self.log.lock().reports.last().cloned()
    }

    pub fn sorted_summary(&self) -> Option<String> {
        self.log.lock().sorted.clone()
    }

    pub fn caller_thread_cost(&self) -> Option<Duration> {
        self.log.lock().caller_thread_cost
    }

    pub fn delivered_on(&self) -> Vec<std::thread::ThreadId> {
        self.log.lock().delivered_on.clone()
    }
}

impl MonitorSink for RecordingSink {
    fn wants_sorted_summary(&self) -> bool {
        true
    }

    fn on_sorted(&mut self, summary: &str) {
        self.log.lock().sorted = Some(summary.to_string());
    }

    fn on_caller_thread_cost(&mut self, cost: Duration) {
        self.log.lock().caller_thread_cost = Some(cost);
    }

    fn on_report(&mut self, report: &ExecutionReport) {
        let mut log = self.log.lock();
        log.reports.push(report.clone());
        log.delivered_on.push(std::thread::current().id());
    }
}

/// `DispatcherListener` counting its callbacks.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl DispatcherListener for RecordingDispatcher {
    fn on_start_before(&mut self) {
        self.calls.lock().push("start_before");
    }

    fn on_finish(&mut self) {
        self.calls.lock().push("finish");
    }
}
