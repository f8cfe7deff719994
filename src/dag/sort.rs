// src/dag/sort.rs

//! Deterministic topological ordering with priority promotion.
//!
//! Kahn's algorithm over the reverse map of a [`TaskGraph`]. Ties are broken
//! by insertion order, so identical input always yields identical output.
//! When at least one task is flagged `promote_early` or blocks the caller, a
//! stable four-bucket pass moves the interesting tasks forward:
//!
//! 1. tasks other tasks depend on
//! 2. `promote_early` tasks
//! 3. tasks the caller thread waits for
//! 4. everything else
//!
//! Every predecessor lands in bucket 1, so the result is still a valid
//! topological order.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::errors::{BootdagError, Result};

/// Output of a successful sort: indices into `TaskGraph::tasks()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedOrder {
    pub order: Vec<usize>,
    /// Whether the promotion pass ran.
    pub promoted: bool,
    pub elapsed: Duration,
}

pub struct TopologicalSorter;

impl TopologicalSorter {
    pub fn sort(graph: &TaskGraph) -> Result<SortedOrder> {
        let started = Instant::now();
        let tasks = graph.tasks();

        let mut in_degree = in_degrees(graph)?;

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(tasks.len());
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &child in graph.dependents_of(tasks[idx].tag()) {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() < tasks.len() {
            let unresolved: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg > 0)
                .map(|(idx, _)| tasks[idx].tag().to_string())
                .collect();
            return Err(BootdagError::DagCycle(unresolved));
        }

        let needs_promotion = tasks
            .iter()
            .any(|t| t.is_promoted_early() || t.blocks_caller());
        if needs_promotion {
            order = promote(graph, order);
        }

        let elapsed = started.elapsed();
        debug!(
            tasks = tasks.len(),
            promoted = needs_promotion,
            elapsed_us = elapsed.as_micros() as u64,
            "task graph sorted"
        );

        Ok(SortedOrder {
            order,
            promoted: needs_promotion,
            elapsed,
        })
    }
}

/// In-degree per task index. Fails on the first duplicated tag.
fn in_degrees(graph: &TaskGraph) -> Result<Vec<usize>> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(graph.len());
    let mut degrees = Vec::with_capacity(graph.len());
    for (idx, task) in graph.tasks().iter().enumerate() {
        if seen.insert(task.tag(), idx).is_some() {
            return Err(BootdagError::DuplicateTag(task.tag().to_string()));
        }
        degrees.push(task.predecessors().len());
    }
    Ok(degrees)
}

fn promote(graph: &TaskGraph, sorted: Vec<usize>) -> Vec<usize> {
    let tasks = graph.tasks();
    let mut depended_upon = Vec::new();
    let mut early = Vec::new();
    let mut blocking = Vec::new();
    let mut rest = Vec::new();

    for idx in sorted {
        let task = &tasks[idx];
        if graph.is_depended_upon(task.tag()) {
            depended_upon.push(idx);
        } else if task.is_promoted_early() {
            early.push(idx);
        } else if task.blocks_caller() {
            blocking.push(idx);
        } else {
            rest.push(idx);
        }
    }

    depended_upon.extend(early);
    depended_upon.extend(blocking);
    depended_upon.extend(rest);
    depended_upon
}

/// Human-readable dump of the order and every dependency relation.
pub fn describe_order(graph: &TaskGraph, order: &[usize]) -> String {
    let tasks = graph.tasks();
    let mut out = String::from("task sort list:\n");
    for &idx in order {
        let _ = writeln!(out, "  {}", tasks[idx].tag());
    }
    out.push_str("dependency relations:\n");
    for &idx in order {
        let tag = tasks[idx].tag();
        let dependents = graph.dependents_of(tag);
        if dependents.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  {tag} is a predecessor of {} task(s)", dependents.len());
        for &child in dependents {
            let _ = writeln!(out, "    <- {}", tasks[child].tag());
        }
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::graph::GraphBuilder;
    use crate::task::Task;

    fn graph(tasks: Vec<Task>) -> TaskGraph {
        let mut builder = GraphBuilder::new();
        for t in tasks {
            builder.add_task(t).unwrap();
        }
        builder.finalize().unwrap()
    }

    fn tags(graph: &TaskGraph, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&i| graph.tasks()[i].tag().to_string())
            .collect()
    }

    #[test]
    fn ties_keep_insertion_order() {
        let g = graph(vec![
            Task::new("c", || {}),
            Task::new("a", || {}),
            Task::new("b", || {}),
        ]);
        let sorted = TopologicalSorter::sort(&g).unwrap();
        assert_eq!(tags(&g, &sorted.order), ["c", "a", "b"]);
        assert!(!sorted.promoted);
    }

    #[test]
    fn predecessors_come_first() {
        let g = graph(vec![
            Task::new("d", || {}).after(["b", "c"]),
            Task::new("b", || {}).after(["a"]),
            Task::new("c", || {}).after(["a"]),
            Task::new("a", || {}),
        ]);
        let sorted = TopologicalSorter::sort(&g).unwrap();
        assert_eq!(tags(&g, &sorted.order), ["a", "b", "c", "d"]);
    }

    #[test]
    fn duplicate_tag_is_fatal() {
        let g = graph(vec![Task::new("a", || {}), Task::new("a", || {})]);
        assert!(matches!(
            TopologicalSorter::sort(&g),
            Err(BootdagError::DuplicateTag(tag)) if tag == "a"
        ));
    }

    #[test]
    fn cycle_reports_unresolved_tasks() {
        let g = graph(vec![
            Task::new("root", || {}),
            Task::new("x", || {}).after(["y", "root"]),
            Task::new("y", || {}).after(["x"]),
            Task::new("z", || {}).after(["y"]),
        ]);
        match TopologicalSorter::sort(&g) {
            Err(BootdagError::DagCycle(unresolved)) => {
                assert_eq!(unresolved, ["x", "y", "z"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn promotion_buckets() {
        let g = graph(vec![
            Task::new("plain", || {}),
            Task::new("blocking", || {}).block_caller(true),
            Task::new("slow", || {}).promote_early(true),
            Task::new("base", || {}),
            Task::new("uses_base", || {}).after(["base"]),
        ]);
        let sorted = TopologicalSorter::sort(&g).unwrap();
        assert!(sorted.promoted);
        assert_eq!(
            tags(&g, &sorted.order),
            ["base", "slow", "blocking", "plain", "uses_base"]
        );
    }

    #[test]
    fn describe_lists_relations() {
        let g = graph(vec![
            Task::new("a", || {}),
            Task::new("b", || {}).after(["a"]),
        ]);
        let sorted = TopologicalSorter::sort(&g).unwrap();
        let text = describe_order(&g, &sorted.order);
        assert!(text.starts_with("task sort list:"));
        assert!(text.contains("a is a predecessor of 1 task(s)"));
        assert!(text.ends_with("<- b"));
    }
}
