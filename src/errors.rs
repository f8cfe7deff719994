// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only configuration problems and caller misuse are errors. Barrier
//! timeouts are reported through the monitor and the log instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task tag must not be empty")]
    EmptyTag,

    #[error("Duplicate task tag: {0}")]
    DuplicateTag(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("task '{task}' depends on unknown task '{missing}'")]
    UnknownDependency { task: String, missing: String },

    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Cycle detected in DAG, unresolved tasks: {}", .0.join(", "))]
    DagCycle(Vec<String>),

    #[error("worker-thread tasks were added but no worker pool was configured")]
    MissingWorkerPool,

    #[error("Scheduler misuse: {0}")]
    Misuse(String),

    #[error("Worker pool has been shut down")]
    PoolShutdown,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BootdagError>;
