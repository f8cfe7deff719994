// src/engine/mod.rs

//! Dispatch engine.
//!
//! [`SchedulerBuilder`] collects tasks, listeners and the worker pool, then
//! finalizes and sorts the graph. The resulting [`Scheduler`] runs the graph
//! exactly once:
//!
//! ```text
//! Idle --start()--> Running --last task finished--> Completed
//! ```
//!
//! The per-task protocol itself lives in `exec::runner`.

pub mod builder;
pub mod scheduler;

pub use builder::SchedulerBuilder;
pub use scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idle = 0,
    Running = 1,
    Completed = 2,
}

impl SchedulerState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SchedulerState::Idle,
            1 => SchedulerState::Running,
            _ => SchedulerState::Completed,
        }
    }
}

/// What a call to [`Scheduler::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    /// This call dispatched the graph.
    Started,
    /// An earlier call is still running; nothing was done.
    AlreadyRunning,
    /// The graph already ran to completion; nothing was done.
    AlreadyCompleted,
}
