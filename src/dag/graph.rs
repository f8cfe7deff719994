// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::errors::{BootdagError, Result};
use crate::task::Task;
use crate::types::TaskTag;

/// Accumulates tasks and explicit dependency edges.
///
/// Nodes are added first; edges may reference tags that are added later.
/// Every edge is checked in [`GraphBuilder::finalize`], where unknown tags
/// and self-edges are rejected. Acyclicity is left to the sorter.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    tasks: Vec<Task>,
    /// Number of tasks the caller thread will wait for.
    blocking: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Outstanding-barrier counter: barrier-tracked tasks added so far.
    pub fn blocking_count(&self) -> usize {
        self.blocking
    }

    pub fn add_task(&mut self, task: Task) -> Result<&mut Self> {
        if task.tag().trim().is_empty() {
            return Err(BootdagError::EmptyTag);
        }
        if task.blocks_caller() {
            self.blocking += 1;
        }
        debug!(task = %task.tag(), blocks_caller = task.blocks_caller(), "task added to graph");
        self.tasks.push(task);
        Ok(self)
    }

    /// Add a body-less task bundling `predecessors` under one tag.
    pub fn add_anchor<I, S>(&mut self, tag: impl Into<TaskTag>, predecessors: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        self.add_task(Task::anchor(tag, predecessors))
    }

    /// Attach predecessor tags to the task named `tag`.
    pub fn add_dependency<I, S>(&mut self, tag: &str, predecessors: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskTag>,
    {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| BootdagError::UnknownTask(tag.to_string()))?;
        task.add_predecessors(predecessors);
        Ok(self)
    }

    /// Validate edges and derive the reverse map.
    pub fn finalize(self) -> Result<TaskGraph> {
        let known: HashSet<&str> = self.tasks.iter().map(|t| t.tag()).collect();

        for task in &self.tasks {
            for pred in task.predecessors() {
                if pred == task.tag() {
                    return Err(BootdagError::SelfDependency(task.tag().to_string()));
                }
                if !known.contains(pred.as_str()) {
                    return Err(BootdagError::UnknownDependency {
                        task: task.tag().to_string(),
                        missing: pred.clone(),
                    });
                }
            }
        }

        let mut dependents: HashMap<TaskTag, Vec<usize>> = HashMap::new();
        for (idx, task) in self.tasks.iter().enumerate() {
            for pred in task.predecessors() {
                dependents.entry(pred.clone()).or_default().push(idx);
            }
        }

        Ok(TaskGraph {
            tasks: self.tasks,
            dependents,
            blocking: self.blocking,
        })
    }
}

/// A finalized task graph: tasks in insertion order plus the reverse map
/// `predecessor tag -> indices of its dependents`.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    dependents: HashMap<TaskTag, Vec<usize>>,
    blocking: usize,
}

impl TaskGraph {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Indices of the tasks that list `tag` as a predecessor.
    pub fn dependents_of(&self, tag: &str) -> &[usize] {
        self.dependents
            .get(tag)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether some other task waits on `tag`.
    pub fn is_depended_upon(&self, tag: &str) -> bool {
        !self.dependents_of(tag).is_empty()
    }

    pub fn blocking_count(&self) -> usize {
        self.blocking
    }

    pub(crate) fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(tag: &str) -> Task {
        Task::new(tag, || {})
    }

    #[test]
    fn rejects_empty_tag() {
        let mut builder = GraphBuilder::new();
        let err = builder.add_task(noop("  ")).unwrap_err();
        assert!(matches!(err, BootdagError::EmptyTag));
        assert!(builder.is_empty());
    }

    #[test]
    fn counts_only_worker_tasks_that_block_the_caller() {
        let mut builder = GraphBuilder::new();
        builder
            .add_task(noop("a").block_caller(true))
            .unwrap()
            .add_task(noop("b").on_caller_thread().block_caller(true))
            .unwrap()
            .add_task(noop("c"))
            .unwrap();
        assert_eq!(builder.blocking_count(), 1);
    }

    #[test]
    fn builds_reverse_map() {
        let mut builder = GraphBuilder::new();
        builder.add_task(noop("a")).unwrap();
        builder.add_task(noop("b").after(["a"])).unwrap();
        builder.add_task(noop("c")).unwrap();
        builder.add_dependency("c", ["a", "b", "a"]).unwrap();

        let graph = builder.finalize().unwrap();
        assert_eq!(graph.dependents_of("a"), &[1, 2]);
        assert_eq!(graph.dependents_of("b"), &[2]);
        assert!(graph.dependents_of("c").is_empty());
        assert!(graph.is_depended_upon("a"));
        assert!(!graph.is_depended_upon("c"));
    }

    #[test]
    fn edges_may_reference_tasks_added_later() {
        let mut builder = GraphBuilder::new();
        builder.add_task(noop("b").after(["a"])).unwrap();
        builder.add_task(noop("a")).unwrap();
        assert!(builder.finalize().is_ok());
    }

    #[test]
    fn rejects_unknown_dependency_at_finalize() {
        let mut builder = GraphBuilder::new();
        builder.add_task(noop("b").after(["ghost"])).unwrap();
        match builder.finalize() {
            Err(BootdagError::UnknownDependency { task, missing }) => {
                assert_eq!(task, "b");
                assert_eq!(missing, "ghost");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn rejects_self_dependency() {
        let mut builder = GraphBuilder::new();
        builder.add_task(noop("a").after(["a"])).unwrap();
        assert!(matches!(
            builder.finalize(),
            Err(BootdagError::SelfDependency(tag)) if tag == "a"
        ));
    }

    #[test]
    fn dependency_on_unknown_task_name_is_an_error() {
        let mut builder = GraphBuilder::new();
        let err = builder.add_dependency("nope", ["a"]).unwrap_err();
        assert!(matches!(err, BootdagError::UnknownTask(tag) if tag == "nope"));
    }

    #[test]
    fn anchor_counts_towards_the_barrier() {
        let mut builder = GraphBuilder::new();
        builder.add_task(noop("a")).unwrap();
        builder.add_anchor("core", ["a"]).unwrap();
        assert_eq!(builder.blocking_count(), 1);
        let graph = builder.finalize().unwrap();
        assert!(graph.tasks()[1].is_anchor());
    }
}
