// src/exec/mod.rs

//! Execution layer.
//!
//! - [`pool`] provides the `ExecutorBackend` trait and the `WorkerPool` the
//!   scheduler submits worker-thread tasks to. Tests can replace it with
//!   their own backend.
//! - [`runner`] holds the per-task protocol shared by worker jobs and the
//!   caller thread.

pub mod pool;
pub(crate) mod runner;

pub use pool::{DEFAULT_QUEUE_CAPACITY, ExecutorBackend, Job, JobHandle, JobStatus, WorkerPool};
