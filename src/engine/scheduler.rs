// src/engine/scheduler.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::dag::exclude_disabled;
use crate::engine::{SchedulerState, StartStatus};
use crate::errors::{BootdagError, Result};
use crate::exec::runner::RunState;
use crate::exec::{ExecutorBackend, Job, JobHandle, JobStatus};
use crate::monitor::{DispatcherListener, ExecutionReport, MonitorSink, SkipReason};
use crate::types::{ProcessRole, ThreadAffinity};

/// A finalized, sorted task graph bound to an owner thread.
///
/// `start`, `wait_for_completion` and `try_deliver_report` must be called
/// on the owner thread. `cancel`, `state` and `report` may be called from
/// anywhere.
pub struct Scheduler {
    run: Arc<RunState>,
    order: Vec<usize>,
    /// Barrier-tracked tasks before filtering.
    blocking: usize,
    pool: Option<Arc<dyn ExecutorBackend>>,
    sink: Mutex<Box<dyn MonitorSink>>,
    dispatcher_listener: Mutex<Option<Box<dyn DispatcherListener>>>,
    owner: ThreadId,
    role: ProcessRole,
    caller_wait_timeout: Duration,
    jobs: Mutex<Vec<JobHandle>>,
    delivered: AtomicBool,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run: RunState,
        order: Vec<usize>,
        blocking: usize,
        pool: Option<Arc<dyn ExecutorBackend>>,
        sink: Box<dyn MonitorSink>,
        dispatcher_listener: Option<Box<dyn DispatcherListener>>,
        owner: ThreadId,
        role: ProcessRole,
        caller_wait_timeout: Duration,
    ) -> Self {
        Self {
            run: Arc::new(run),
            order,
            blocking,
            pool,
            sink: Mutex::new(sink),
            dispatcher_listener: Mutex::new(dispatcher_listener),
            owner,
            role,
            caller_wait_timeout,
            jobs: Mutex::new(Vec::new()),
            delivered: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.run.state.load(Ordering::Acquire))
    }

    pub fn len(&self) -> usize {
        self.run.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.run.slots.is_empty()
    }

    /// Tags in dispatch order.
    pub fn sorted_tags(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&idx| self.run.slots[idx].tag.as_str())
            .collect()
    }

    /// Dispatch the graph and block until every barrier-tracked task has
    /// finished or the caller wait timeout elapsed.
    ///
    /// Worker tasks are submitted in sorted order, then caller-thread tasks
    /// run inline. A barrier timeout is logged and recorded in the report;
    /// it is not an error.
    pub fn start(&self) -> Result<StartStatus> {
        self.ensure_owner("start")?;

        if let Err(current) = self.run.state.compare_exchange(
            SchedulerState::Idle as u8,
            SchedulerState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            let status = match SchedulerState::from_u8(current) {
                SchedulerState::Completed => StartStatus::AlreadyCompleted,
                _ => StartStatus::AlreadyRunning,
            };
            debug!(?status, "start() called again; ignoring");
            return Ok(status);
        }

        let run = &self.run;
        run.monitor.record_dispatch_start();
        info!(tasks = run.slots.len(), role = ?self.role, "dispatching startup tasks");

        if let Some(listener) = self.dispatcher_listener.lock().as_mut() {
            listener.on_start_before();
        }

        let exclusion = exclude_disabled(&run.slots, &self.order);
        for &idx in &self.order {
            if exclusion.is_excluded(idx) {
                run.monitor.record_skipped(&run.slots[idx].tag, SkipReason::Disabled);
            }
        }

        let barrier_count = self.blocking - exclusion.excluded_blocking;
        let total = run.slots.len() - exclusion.excluded_count();
        run.monitor.record_barrier_tracked(barrier_count);
        run.arm(total, barrier_count);

        let mut caller_tasks = Vec::new();
        for &idx in &self.order {
            if exclusion.is_excluded(idx) {
                continue;
            }
            let slot = &run.slots[idx];
            if slot.primary_only && !self.role.is_primary() {
                run.skip_task(idx, SkipReason::NotPrimaryProcess);
                continue;
            }
            match slot.affinity {
                ThreadAffinity::Caller => caller_tasks.push(idx),
                ThreadAffinity::Worker => self.submit(idx),
            }
        }

        let caller_started = Instant::now();
        for idx in caller_tasks {
            run.run_task(idx);
        }
        run.monitor.record_caller_tasks(caller_started.elapsed());

        if let Some(barrier) = run.barrier() {
            let waited = Instant::now();
            let opened = barrier.wait_timeout(self.caller_wait_timeout);
            run.monitor.record_caller_barrier_wait(waited.elapsed(), !opened);
            if !opened {
                warn!(
                    outstanding = barrier.count(),
                    timeout_ms = self.caller_wait_timeout.as_millis() as u64,
                    "caller wait timed out; continuing without the remaining tasks"
                );
            }
        }

        let cost = run.monitor.record_caller_thread_cost();
        self.sink.lock().on_caller_thread_cost(cost);
        info!(cost_ms = cost.as_millis() as u64, "start() returning to caller");

        if self.state() == SchedulerState::Completed {
            self.deliver_report();
        }
        Ok(StartStatus::Started)
    }

    fn submit(&self, idx: usize) {
        let slot = &self.run.slots[idx];
        let Some(pool) = &self.pool else {
            // Unreachable through the builder, which rejects this graph.
            error!(task = %slot.tag, "no worker pool configured; skipping task");
            self.run.skip_task(idx, SkipReason::Rejected);
            return;
        };

        let run = Arc::clone(&self.run);
        let job = Job::new(slot.priority, move |status| match status {
            JobStatus::Run => {
                run.run_task(idx);
            }
            JobStatus::Cancelled => run.skip_task(idx, SkipReason::Cancelled),
        });

        match pool.submit(job) {
            Ok(handle) => self.jobs.lock().push(handle),
            Err(e) => {
                error!(task = %slot.tag, error = %e, "worker pool rejected task");
                self.run.skip_task(idx, SkipReason::Rejected);
            }
        }
    }

    /// Cancel worker jobs that have not started yet.
    ///
    /// Cancelled tasks complete as skipped, so their dependents and the
    /// caller barrier are still released. Running bodies are not
    /// interrupted. Returns the number of jobs cancelled by this call.
    pub fn cancel(&self) -> usize {
        let cancelled = self.jobs.lock().iter().filter(|h| h.cancel()).count();
        info!(cancelled, "cancel requested");
        cancelled
    }

    /// Block until every task finished or `timeout` elapsed, then deliver
    /// the report if it is ready.
    ///
    /// Returns whether the run completed.
    pub fn wait_for_completion(&self, timeout: Duration) -> Result<bool> {
        self.ensure_owner("wait_for_completion")?;
        if self.state() == SchedulerState::Idle {
            return Err(BootdagError::Misuse(
                "wait_for_completion() called before start()".to_string(),
            ));
        }
        let done = self.run.completion().wait_timeout(timeout);
        if done {
            self.deliver_report();
        }
        Ok(done)
    }

    /// Deliver the report if the run completed and it was not delivered yet.
    ///
    /// Returns `true` if this call delivered it.
    pub fn try_deliver_report(&self) -> Result<bool> {
        self.ensure_owner("try_deliver_report")?;
        if self.state() != SchedulerState::Completed {
            return Ok(false);
        }
        Ok(self.deliver_report())
    }

    /// Snapshot of the report once the run completed.
    pub fn report(&self) -> Option<ExecutionReport> {
        (self.state() == SchedulerState::Completed).then(|| self.run.monitor.report())
    }

    fn deliver_report(&self) -> bool {
        if self.delivered.swap(true, Ordering::AcqRel) {
            return false;
        }
        let report = self.run.monitor.report();
        self.sink.lock().on_report(&report);
        if let Some(listener) = self.dispatcher_listener.lock().as_mut() {
            listener.on_finish();
        }
        debug!("execution report delivered");
        true
    }

    fn ensure_owner(&self, op: &str) -> Result<()> {
        let current = thread::current().id();
        if current != self.owner {
            return Err(BootdagError::Misuse(format!(
                "{op}() must be called on the owner thread {:?}, not {current:?}",
                self.owner
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("tasks", &self.sorted_tags())
            .field("owner", &self.owner)
            .field("role", &self.role)
            .finish()
    }
}
