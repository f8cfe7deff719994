// src/dag/filter.rs

//! Exclusion of disabled tasks before dispatch.

use tracing::debug;

/// What the exclusion pass needs to know about a node.
pub trait FilterNode {
    fn tag(&self) -> &str;
    fn is_enabled(&self) -> bool;
    fn blocks_caller(&self) -> bool;
    /// Indices of the nodes that list this one as a predecessor.
    fn dependents(&self) -> &[usize];
}

/// Result of [`exclude_disabled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    /// `excluded[i]` is true when node `i` must not run.
    pub excluded: Vec<bool>,
    /// Excluded nodes that were counted in the caller barrier.
    pub excluded_blocking: usize,
}

impl Exclusion {
    pub fn is_excluded(&self, idx: usize) -> bool {
        self.excluded[idx]
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.iter().filter(|e| **e).count()
    }
}

/// Walk `order` once; every disabled node and, transitively, every node
/// depending on it is excluded.
pub fn exclude_disabled<N: FilterNode>(nodes: &[N], order: &[usize]) -> Exclusion {
    let mut excluded = vec![false; nodes.len()];
    let mut excluded_blocking = 0;

    for &root in order {
        if nodes[root].is_enabled() || excluded[root] {
            continue;
        }

        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if excluded[idx] {
                continue;
            }
            excluded[idx] = true;
            if nodes[idx].blocks_caller() {
                excluded_blocking += 1;
            }
            if idx == root {
                debug!(task = %nodes[idx].tag(), "task disabled; excluding it and its dependents");
            } else {
                debug!(
                    task = %nodes[idx].tag(),
                    disabled = %nodes[root].tag(),
                    "excluding dependent of disabled task"
                );
            }
            stack.extend(nodes[idx].dependents().iter().copied());
        }
    }

    Exclusion {
        excluded,
        excluded_blocking,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        tag: &'static str,
        enabled: bool,
        blocks: bool,
        dependents: Vec<usize>,
    }

    impl FilterNode for Node {
        fn tag(&self) -> &str {
            self.tag
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn blocks_caller(&self) -> bool {
            self.blocks
        }
        fn dependents(&self) -> &[usize] {
            &self.dependents
        }
    }

    fn node(tag: &'static str, enabled: bool, blocks: bool, dependents: Vec<usize>) -> Node {
        Node {
            tag,
            enabled,
            blocks,
            dependents,
        }
    }

    #[test]
    fn everything_enabled_excludes_nothing() {
        let nodes = vec![node("a", true, true, vec![1]), node("b", true, false, vec![])];
        let ex = exclude_disabled(&nodes, &[0, 1]);
        assert_eq!(ex.excluded_count(), 0);
        assert_eq!(ex.excluded_blocking, 0);
    }

    #[test]
    fn disabled_task_excludes_transitive_dependents() {
        // x (disabled) -> y -> z ; w independent
        let nodes = vec![
            node("x", false, false, vec![1]),
            node("y", true, true, vec![2]),
            node("z", true, true, vec![]),
            node("w", true, true, vec![]),
        ];
        let ex = exclude_disabled(&nodes, &[0, 3, 1, 2]);
        assert_eq!(ex.excluded, vec![true, true, true, false]);
        assert_eq!(ex.excluded_blocking, 2);
    }

    #[test]
    fn diamond_counts_shared_dependent_once() {
        // a, b disabled; both feed c (blocking)
        let nodes = vec![
            node("a", false, false, vec![2]),
            node("b", false, false, vec![2]),
            node("c", true, true, vec![]),
        ];
        let ex = exclude_disabled(&nodes, &[0, 1, 2]);
        assert_eq!(ex.excluded_count(), 3);
        assert_eq!(ex.excluded_blocking, 1);
    }
}
