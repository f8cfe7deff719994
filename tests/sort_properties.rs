// tests/sort_properties.rs

use std::collections::{HashMap, HashSet};

use bootdag::Task;
use bootdag::dag::{GraphBuilder, TopologicalSorter};
use bootdag::errors::BootdagError;
use proptest::prelude::*;

/// One generated task: its predecessor indices and flags.
#[derive(Debug, Clone)]
struct GenNode {
    deps: Vec<usize>,
    block_caller: bool,
    promote_early: bool,
}

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<GenNode>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            (
                proptest::collection::vec(any::<usize>(), 0..4),
                any::<bool>(),
                any::<bool>(),
            ),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (potential, block_caller, promote_early))| {
                    let deps: HashSet<usize> = if i == 0 {
                        HashSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    GenNode {
                        deps: deps.into_iter().collect(),
                        block_caller,
                        promote_early,
                    }
                })
                .collect()
        })
    })
}

fn build(nodes: &[GenNode], shuffle_seed: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new();
    // Insertion order is a rotation of the generated order, so predecessors
    // may be added after their dependents.
    let n = nodes.len();
    for k in 0..n {
        let i = (k + shuffle_seed) % n;
        let node = &nodes[i];
        let task = Task::new(format!("task_{i}"), || {})
            .after(node.deps.iter().map(|d| format!("task_{d}")))
            .block_caller(node.block_caller)
            .promote_early(node.promote_early);
        builder.add_task(task).unwrap();
    }
    builder
}

proptest! {
    #[test]
    fn sorted_order_respects_every_edge(nodes in dag_strategy(25), seed in 0usize..25) {
        let graph = build(&nodes, seed).finalize().unwrap();
        let sorted = TopologicalSorter::sort(&graph).unwrap();

        prop_assert_eq!(sorted.order.len(), graph.len());

        let position: HashMap<&str, usize> = sorted
            .order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (graph.tasks()[idx].tag(), pos))
            .collect();
        prop_assert_eq!(position.len(), graph.len());

        for task in graph.tasks() {
            for pred in task.predecessors() {
                prop_assert!(position[pred.as_str()] < position[task.tag()]);
            }
        }
    }

    #[test]
    fn sort_is_deterministic(nodes in dag_strategy(15), seed in 0usize..15) {
        let first = TopologicalSorter::sort(&build(&nodes, seed).finalize().unwrap()).unwrap();
        let second = TopologicalSorter::sort(&build(&nodes, seed).finalize().unwrap()).unwrap();
        prop_assert_eq!(first.order, second.order);
    }

    #[test]
    fn back_edge_always_yields_cycle(nodes in dag_strategy(12), pick in any::<usize>()) {
        // Find a task with a predecessor and add the reverse edge.
        let with_deps: Vec<usize> = (0..nodes.len()).filter(|&i| !nodes[i].deps.is_empty()).collect();
        prop_assume!(!with_deps.is_empty());
        let child = with_deps[pick % with_deps.len()];
        let parent = nodes[child].deps[0];

        let mut builder = build(&nodes, 0);
        builder
            .add_dependency(&format!("task_{parent}"), [format!("task_{child}")])
            .unwrap();
        let graph = builder.finalize().unwrap();

        match TopologicalSorter::sort(&graph) {
            Err(BootdagError::DagCycle(tags)) => {
                let parent_tag = format!("task_{parent}");
                let child_tag = format!("task_{child}");
                prop_assert!(tags.contains(&parent_tag));
                prop_assert!(tags.contains(&child_tag));
            }
            other => prop_assert!(false, "expected DagCycle, got {:?}", other.map(|s| s.order)),
        }
    }
}
