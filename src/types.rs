// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// Canonical task identifier used throughout the crate.
pub type TaskTag = String;

/// Environment variable consulted once by [`ProcessRole::detect`].
pub const PROCESS_ROLE_ENV: &str = "BOOTDAG_PROCESS_ROLE";

/// Which thread a task must run on.
///
/// - `Caller`: run inline on the thread that called `Scheduler::start`
///   (typically a UI or main thread), after all worker tasks were submitted.
/// - `Worker`: submit to the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadAffinity {
    Caller,
    #[default]
    Worker,
}

impl FromStr for ThreadAffinity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "caller" | "main" => Ok(ThreadAffinity::Caller),
            "worker" | "async" => Ok(ThreadAffinity::Worker),
            other => Err(format!(
                "invalid thread affinity: {other} (expected \"caller\" or \"worker\")"
            )),
        }
    }
}

/// Role of the current process in a multi-process application.
///
/// Tasks flagged `primary_only` are short-circuited in a `Secondary`
/// process: they count as done but their body never runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    #[default]
    Primary,
    Secondary,
}

impl ProcessRole {
    /// Read the role from `BOOTDAG_PROCESS_ROLE`.
    ///
    /// Unset or unparseable values mean `Primary`. The scheduler builder
    /// calls this once and carries the value in its configuration.
    pub fn detect() -> Self {
        std::env::var(PROCESS_ROLE_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_primary(self) -> bool {
        self == ProcessRole::Primary
    }
}

impl FromStr for ProcessRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "main" => Ok(ProcessRole::Primary),
            "secondary" => Ok(ProcessRole::Secondary),
            other => Err(format!(
                "invalid process role: {other} (expected \"primary\" or \"secondary\")"
            )),
        }
    }
}
