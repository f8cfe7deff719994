#![allow(dead_code)]

use bootdag::config::{AnchorConfig, Manifest, RawManifest, SchedulerConfig, TaskConfig};
use bootdag::types::{ProcessRole, ThreadAffinity};

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                config: SchedulerConfig {
                    process_role: ProcessRole::Primary,
                    ..SchedulerConfig::default()
                },
                ..RawManifest::default()
            },
        }
    }

    pub fn with_task(mut self, tag: &str, task: TaskConfig) -> Self {
        self.manifest.task.insert(tag.to_string(), task);
        self
    }

    pub fn with_anchor(mut self, tag: &str, after: &[&str]) -> Self {
        self.manifest.anchor.insert(
            tag.to_string(),
            AnchorConfig {
                after: after.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub fn worker_threads(mut self, n: usize) -> Self {
        self.manifest.config.worker_threads = n;
        self
    }

    pub fn caller_wait_timeout_ms(mut self, ms: u64) -> Self {
        self.manifest.config.caller_wait_timeout_ms = ms;
        self
    }

    pub fn process_role(mut self, role: ProcessRole) -> Self {
        self.manifest.config.process_role = role;
        self
    }

    pub fn raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn on_caller_thread(mut self) -> Self {
        self.task.thread = ThreadAffinity::Caller;
        self
    }

    pub fn sleep_ms(mut self, ms: u64) -> Self {
        self.task.sleep_ms = ms;
        self
    }

    pub fn block_caller(mut self, val: bool) -> Self {
        self.task.block_caller = val;
        self
    }

    pub fn primary_only(mut self, val: bool) -> Self {
        self.task.primary_only = val;
        self
    }

    pub fn promote_early(mut self, val: bool) -> Self {
        self.task.promote_early = val;
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.task.enabled = val;
        self
    }

    pub fn priority(mut self, hint: i32) -> Self {
        self.task.priority = Some(hint);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
