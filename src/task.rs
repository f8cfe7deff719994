// src/task.rs

//! Task model.
//!
//! A [`Task`] is a single value carrying its tag, predecessor tags, an
//! explicit [`ThreadAffinity`] and a handful of wait-policy flags, plus an
//! opaque body. Anchor tasks have no body; they only bundle a predecessor
//! set that other tasks can depend on through a single tag.
//!
//! Callers that prefer to implement tasks as types can implement
//! [`StartupTask`] and convert with `Task::from`.

use std::fmt;

use crate::types::{TaskTag, ThreadAffinity};

/// Opaque unit of work. Runs at most once.
pub type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// Interface for task types supplied by the application.
///
/// The scheduler only queries these values; it never constructs bodies.
pub trait StartupTask: Send + 'static {
    fn tag(&self) -> TaskTag;

    fn run(&mut self);

    fn predecessors(&self) -> Vec<TaskTag> {
        Vec::new()
    }

    fn affinity(&self) -> ThreadAffinity {
        ThreadAffinity::Worker
    }

    fn primary_only(&self) -> bool {
        false
    }

    /// Only meaningful for worker tasks: the caller thread waits for it.
    fn block_caller(&self) -> bool {
        false
    }

    /// Long-running relative to its priority; start it as early as possible.
    fn promote_early(&self) -> bool {
        false
    }

    fn enabled(&self) -> bool {
        true
    }

    /// Optional thread priority hint, interpreted by the worker pool.
    fn priority(&self) -> Option<i32> {
        None
    }
}

pub struct Task {
    tag: TaskTag,
    predecessors: Vec<TaskTag>,
    affinity: ThreadAffinity,
    block_caller: bool,
    primary_only: bool,
    promote_early: bool,
    enabled: bool,
    priority: Option<i32>,
    body: Option<TaskBody>,
}

impl Task {
    /// A worker-thread task running `body`.
    pub fn new<F>(tag: impl Into<TaskTag>, body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_body(tag.into(), Some(Box::new(body)))
    }

    /// A body-less task that completes as soon as its predecessors have.
    ///
    /// Anchors block the caller by default so that "everything behind this
    /// anchor" can be awaited through one tag.
    pub fn anchor<I, S>(tag: impl Into<TaskTag>, predecessors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        Self::with_body(tag.into(), None)
            .after(predecessors)
            .block_caller(true)
    }

    fn with_body(tag: TaskTag, body: Option<TaskBody>) -> Self {
        Self {
            tag,
            predecessors: Vec::new(),
            affinity: ThreadAffinity::Worker,
            block_caller: false,
            primary_only: false,
            promote_early: false,
            enabled: true,
            priority: None,
            body,
        }
    }

    /// Add predecessor tags. Duplicates are ignored.
    pub fn after<I, S>(mut self, predecessors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        self.add_predecessors(predecessors);
        self
    }

    pub(crate) fn add_predecessors<I, S>(&mut self, predecessors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        for p in predecessors {
            let p = p.into();
            if !self.predecessors.contains(&p) {
                self.predecessors.push(p);
            }
        }
    }

    pub fn affinity(mut self, affinity: ThreadAffinity) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn on_caller_thread(self) -> Self {
        self.affinity(ThreadAffinity::Caller)
    }

    pub fn block_caller(mut self, yes: bool) -> Self {
        self.block_caller = yes;
        self
    }

    pub fn primary_only(mut self, yes: bool) -> Self {
        self.primary_only = yes;
        self
    }

    pub fn promote_early(mut self, yes: bool) -> Self {
        self.promote_early = yes;
        self
    }

    pub fn enabled(mut self, yes: bool) -> Self {
        self.enabled = yes;
        self
    }

    pub fn priority(mut self, hint: i32) -> Self {
        self.priority = Some(hint);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn predecessors(&self) -> &[TaskTag] {
        &self.predecessors
    }

    pub fn thread_affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    pub fn runs_on_caller_thread(&self) -> bool {
        self.affinity == ThreadAffinity::Caller
    }

    pub fn is_primary_only(&self) -> bool {
        self.primary_only
    }

    pub fn is_promoted_early(&self) -> bool {
        self.promote_early
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn priority_hint(&self) -> Option<i32> {
        self.priority
    }

    pub fn is_anchor(&self) -> bool {
        self.body.is_none()
    }

    /// Whether the caller thread's global barrier counts this task.
    ///
    /// Caller-thread tasks never do: they finish before the caller waits.
    pub fn blocks_caller(&self) -> bool {
        self.block_caller && self.affinity == ThreadAffinity::Worker
    }

    pub(crate) fn take_body(&mut self) -> Option<TaskBody> {
        self.body.take()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("tag", &self.tag)
            .field("predecessors", &self.predecessors)
            .field("affinity", &self.affinity)
            .field("block_caller", &self.block_caller)
            .field("primary_only", &self.primary_only)
            .field("promote_early", &self.promote_early)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .field("anchor", &self.body.is_none())
            .finish()
    }
}

impl<T: StartupTask> From<T> for Task {
    fn from(mut inner: T) -> Self {
        let mut task = Self::with_body(inner.tag(), None)
            .after(inner.predecessors())
            .affinity(inner.affinity())
            .block_caller(inner.block_caller())
            .primary_only(inner.primary_only())
            .promote_early(inner.promote_early())
            .enabled(inner.enabled());
        task.priority = inner.priority();
        task.body = Some(Box::new(move || inner.run()));
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn predecessors_are_deduplicated_in_insertion_order() {
        let task = Task::new("c", || {}).after(["a", "b", "a"]).after(["b"]);
        assert_eq!(task.predecessors(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn caller_thread_tasks_never_block_the_caller() {
        let task = Task::new("ui", || {}).on_caller_thread().block_caller(true);
        assert!(!task.blocks_caller());

        let task = Task::new("net", || {}).block_caller(true);
        assert!(task.blocks_caller());
    }

    #[test]
    fn anchor_has_no_body() {
        let mut anchor = Task::anchor("core", ["log", "net"]);
        assert!(anchor.is_anchor());
        assert!(anchor.blocks_caller());
        assert!(anchor.take_body().is_none());
    }

    struct Counter {
        hits: Arc<AtomicUsize>,
    }

    impl StartupTask for Counter {
        fn tag(&self) -> TaskTag {
            "counter".into()
        }

        fn run(&mut self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn predecessors(&self) -> Vec<TaskTag> {
            vec!["log".into()]
        }

        fn affinity(&self) -> ThreadAffinity {
            ThreadAffinity::Caller
        }

        fn priority(&self) -> Option<i32> {
            Some(-2)
        }
    }

    #[test]
    fn startup_task_converts_into_task() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut task = Task::from(Counter {
            hits: Arc::clone(&hits),
        });

        assert_eq!(task.tag(), "counter");
        assert_eq!(task.predecessors(), &["log".to_string()]);
        assert!(task.runs_on_caller_thread());
        assert_eq!(task.priority_hint(), Some(-2));

        let body = task.take_body().expect("body");
        body();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
