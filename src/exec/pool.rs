// src/exec/pool.rs

//! Fixed-size worker pool.
//!
//! Jobs go through a bounded `crossbeam-channel` queue to a set of named OS
//! threads. A full queue never blocks the dispatching thread: the job is
//! handed to a one-off overflow thread instead, because the dispatching
//! thread may own caller-thread tasks that queued jobs are waiting on.
//!
//! Every job is cancellable until a worker picks it up. A cancelled job is
//! still invoked, with [`JobStatus::Cancelled`], so that its owner can do
//! its completion bookkeeping without running the real work.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError, bounded};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::errors::{BootdagError, Result};

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Status a job is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Run,
    Cancelled,
}

#[derive(Debug)]
struct JobControl {
    state: AtomicU8,
}

/// Handle to a submitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    control: Arc<JobControl>,
}

impl JobHandle {
    /// Cancel the job if no worker has started it yet.
    ///
    /// Returns `true` if this call cancelled it. Running jobs are never
    /// interrupted.
    pub fn cancel(&self) -> bool {
        self.control
            .state
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.state.load(Ordering::Acquire) == CANCELLED
    }
}

/// A unit of work for an [`ExecutorBackend`].
pub struct Job {
    priority: Option<i32>,
    work: Box<dyn FnOnce(JobStatus) + Send + 'static>,
    control: Arc<JobControl>,
}

impl Job {
    pub fn new<F>(priority: Option<i32>, work: F) -> Self
    where
        F: FnOnce(JobStatus) + Send + 'static,
    {
        Self {
            priority,
            work: Box::new(work),
            control: Arc::new(JobControl {
                state: AtomicU8::new(QUEUED),
            }),
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Run the job on the current thread, honouring cancellation.
    pub fn execute(self) {
        let started = self
            .control
            .state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if started {
            apply_priority_hint(self.priority);
            (self.work)(JobStatus::Run);
            self.control.state.store(DONE, Ordering::Release);
        } else {
            (self.work)(JobStatus::Cancelled);
        }
    }
}

/// Thread priority hints are not portable; they are accepted and ignored.
fn apply_priority_hint(priority: Option<i32>) {
    if let Some(hint) = priority {
        trace!(hint, "thread priority hint not supported on this platform; ignoring");
    }
}

/// Something that runs jobs off the caller thread.
///
/// [`WorkerPool`] is the production implementation; tests may plug in their
/// own.
pub trait ExecutorBackend: Send + Sync {
    fn submit(&self, job: Job) -> Result<JobHandle>;
}

pub struct WorkerPool {
    name: String,
    threads: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    overflow: AtomicUsize,
}

impl WorkerPool {
    /// `max(2, min(cpus - 1, 5))`, leaving a core for the caller thread.
    pub fn default_threads() -> usize {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cpus.saturating_sub(1).clamp(2, 5)
    }

    pub fn new(threads: usize, queue_capacity: usize) -> Result<Self> {
        Self::with_name("bootdag-worker", threads, queue_capacity)
    }

    pub fn with_name(name: &str, threads: usize, queue_capacity: usize) -> Result<Self> {
        if threads == 0 {
            return Err(BootdagError::ConfigError(
                "worker pool needs at least one thread".to_string(),
            ));
        }
        if queue_capacity == 0 {
            return Err(BootdagError::ConfigError(
                "worker pool queue capacity must be >= 1".to_string(),
            ));
        }

        let (tx, rx) = bounded::<Job>(queue_capacity);
        let mut workers = Vec::with_capacity(threads);

        for n in 0..threads {
            let rx = rx.clone();
            let thread_name = format!("{name}-{}", n + 1);
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    debug!(worker = %thread_name, "worker started");
                    while let Ok(job) = rx.recv() {
                        run_guarded(job);
                    }
                    debug!(worker = %thread_name, "worker finished (queue closed)");
                })?;
            workers.push(handle);
        }

        info!(pool = name, threads, queue_capacity, "worker pool started");

        Ok(Self {
            name: name.to_string(),
            threads,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            overflow: AtomicUsize::new(0),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Jobs that ran on an overflow thread because the queue was full.
    pub fn overflow_count(&self) -> usize {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Close the queue and join the workers once queued jobs drained.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                error!(pool = %self.name, "worker thread panicked");
            }
        }
        info!(pool = %self.name, "worker pool shut down");
    }
}

impl ExecutorBackend for WorkerPool {
    fn submit(&self, job: Job) -> Result<JobHandle> {
        let handle = job.handle();
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(BootdagError::PoolShutdown)?;

        match sender.try_send(job) {
            Ok(()) => Ok(handle),
            Err(TrySendError::Full(job)) => {
                let n = self.overflow.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(pool = %self.name, overflow = n, "worker queue full; running job on overflow thread");
                thread::Builder::new()
                    .name(format!("{}-overflow", self.name))
                    .spawn(move || run_guarded(job))?;
                Ok(handle)
            }
            Err(TrySendError::Disconnected(_)) => Err(BootdagError::PoolShutdown),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("threads", &self.threads)
            .field("overflow", &self.overflow_count())
            .finish()
    }
}

/// Keep the worker alive if a job panics outside the task body.
fn run_guarded(job: Job) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job.execute()));
    if result.is_err() {
        error!("job panicked outside of its task body");
    }
}
