// src/exec/runner.rs

//! Per-task execution protocol.
//!
//! [`RunState`] is the state shared by every thread taking part in one
//! dispatch: the task slots with their private latches, the caller barrier,
//! the finish counter and the monitor. Both the worker jobs and the caller
//! thread drive tasks through [`RunState::run_task`] or, for tasks that must
//! not execute, [`RunState::skip_task`]. Either path ends with the same
//! bookkeeping, so dependents and the caller barrier are always released.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::dag::FilterNode;
use crate::engine::SchedulerState;
use crate::monitor::{
    ExecutionMonitor, SkipReason, TaskOutcome, TaskRunRecord, TaskStatusListener,
};
use crate::sync::CountDownLatch;
use crate::task::{Task, TaskBody};
use crate::types::{TaskTag, ThreadAffinity};

/// Runtime view of one task.
pub(crate) struct TaskSlot {
    pub tag: TaskTag,
    pub affinity: ThreadAffinity,
    /// Counted by the caller barrier.
    pub tracked: bool,
    pub primary_only: bool,
    pub enabled: bool,
    pub priority: Option<i32>,
    pub dependents: Vec<usize>,
    /// Sized to the predecessor count.
    pub latch: CountDownLatch,
    body: Mutex<Option<TaskBody>>,
}

impl TaskSlot {
    pub fn new(mut task: Task, dependents: Vec<usize>) -> Self {
        let body = task.take_body();
        Self {
            tag: task.tag().to_string(),
            affinity: task.thread_affinity(),
            tracked: task.blocks_caller(),
            primary_only: task.is_primary_only(),
            enabled: task.is_enabled(),
            priority: task.priority_hint(),
            latch: CountDownLatch::new(task.predecessors().len()),
            dependents,
            body: Mutex::new(body),
        }
    }
}

impl FilterNode for TaskSlot {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn blocks_caller(&self) -> bool {
        self.tracked
    }

    fn dependents(&self) -> &[usize] {
        &self.dependents
    }
}

pub(crate) struct RunState {
    pub slots: Vec<TaskSlot>,
    pub state: AtomicU8,
    pub monitor: ExecutionMonitor,
    listener: Option<Box<dyn TaskStatusListener>>,
    task_wait_timeout: Duration,
    /// Tasks that take part in this run; set once by `start()`.
    total: AtomicUsize,
    finished: AtomicUsize,
    /// Set by `start()`; `None` when no task is barrier-tracked.
    barrier: OnceLock<Option<CountDownLatch>>,
    /// Opens when the finish counter reaches `total`.
    completion: CountDownLatch,
}

impl RunState {
    pub fn new(
        slots: Vec<TaskSlot>,
        monitor: ExecutionMonitor,
        listener: Option<Box<dyn TaskStatusListener>>,
        task_wait_timeout: Duration,
    ) -> Self {
        Self {
            slots,
            state: AtomicU8::new(SchedulerState::Idle as u8),
            monitor,
            listener,
            task_wait_timeout,
            total: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            barrier: OnceLock::new(),
            completion: CountDownLatch::new(1),
        }
    }

    /// Fix the number of participating tasks and size the caller barrier.
    ///
    /// Must run before any task is dispatched. A run with no participating
    /// task is complete immediately.
    pub fn arm(&self, total: usize, barrier_count: usize) {
        self.total.store(total, Ordering::Release);
        let barrier = (barrier_count > 0).then(|| CountDownLatch::new(barrier_count));
        let _ = self.barrier.set(barrier);
        if total == 0 {
            self.complete();
        }
    }

    pub fn barrier(&self) -> Option<&CountDownLatch> {
        self.barrier.get().and_then(Option::as_ref)
    }

    pub fn completion(&self) -> &CountDownLatch {
        &self.completion
    }

    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    /// Wait for predecessors, run the body and do the completion bookkeeping.
    ///
    /// Returns how long the body ran.
    pub fn run_task(&self, idx: usize) -> Duration {
        let slot = &self.slots[idx];

        let wait_started = Instant::now();
        let mut wait_timed_out = false;
        if slot.latch.count() > 0 {
            self.notify(&slot.tag, "on_waiting", |l| l.on_waiting(&slot.tag));
            debug!(task = %slot.tag, outstanding = slot.latch.count(), "waiting for predecessors");
            if !slot.latch.wait_timeout(self.task_wait_timeout) {
                wait_timed_out = true;
                warn!(
                    task = %slot.tag,
                    timeout_ms = self.task_wait_timeout.as_millis() as u64,
                    outstanding = slot.latch.count(),
                    "predecessor wait timed out; running task anyway"
                );
            }
        }
        let wait = wait_started.elapsed();

        self.notify(&slot.tag, "on_starting", |l| l.on_starting(&slot.tag, wait));
        debug!(task = %slot.tag, wait_ms = wait.as_millis() as u64, "task starting");

        let body = slot.body.lock().take();
        let run_started = Instant::now();
        let outcome = match body {
            Some(body) => match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(()) => TaskOutcome::Completed,
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    warn!(task = %slot.tag, panic = %msg, "task body panicked");
                    TaskOutcome::Panicked(msg)
                }
            },
            None => TaskOutcome::Completed,
        };
        let run = run_started.elapsed();

        let current = thread::current();
        let record = TaskRunRecord {
            tag: slot.tag.clone(),
            wait,
            wait_timed_out,
            run,
            caller_waited: slot.tracked,
            thread_id: current.id(),
            thread_name: current.name().map(str::to_string),
            outcome,
        };
        debug!(task = %slot.tag, run_ms = run.as_millis() as u64, "task finished");
        self.notify(&slot.tag, "on_finished", |l| l.on_finished(&record));
        self.monitor.record_task_execution(record);

        // Dependents wake only after the finish was reported.
        self.release(idx);
        self.mark_finished();
        run
    }

    /// Mark a task done without running its body.
    pub fn skip_task(&self, idx: usize, reason: SkipReason) {
        let slot = &self.slots[idx];
        debug!(task = %slot.tag, ?reason, "task skipped");
        slot.body.lock().take();
        self.monitor.record_skipped(&slot.tag, reason);
        self.release(idx);
        self.mark_finished();
    }

    /// Invoke the status listener, if any. A panicking callback is logged
    /// and swallowed so the task's bookkeeping still happens.
    fn notify(&self, tag: &str, callback: &str, f: impl FnOnce(&dyn TaskStatusListener)) {
        let Some(listener) = &self.listener else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))) {
            warn!(
                task = %tag,
                callback,
                panic = %panic_message(payload.as_ref()),
                "status listener panicked"
            );
        }
    }

    /// Count down every dependent's latch, then the caller barrier.
    fn release(&self, idx: usize) {
        let slot = &self.slots[idx];
        for &child in &slot.dependents {
            self.slots[child].latch.count_down();
        }
        if slot.tracked {
            if let Some(barrier) = self.barrier() {
                barrier.count_down();
            }
        }
    }

    fn mark_finished(&self) {
        let done = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        if done == self.total.load(Ordering::Acquire) {
            self.complete();
        }
    }

    fn complete(&self) {
        self.state
            .store(SchedulerState::Completed as u8, Ordering::Release);
        self.monitor.record_all_finished();
        info!(tasks = self.total.load(Ordering::Acquire), "all startup tasks finished");
        self.completion.count_down();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
