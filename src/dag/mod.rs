// src/dag/mod.rs

//! DAG construction and ordering.
//!
//! - [`graph`] accumulates tasks and derives the reverse dependency map.
//! - [`sort`] produces the deterministic, cycle-checked dispatch order.
//! - [`filter`] excludes disabled tasks and their dependents before dispatch.

pub mod filter;
pub mod graph;
pub mod sort;

pub use filter::{Exclusion, FilterNode, exclude_disabled};
pub use graph::{GraphBuilder, TaskGraph};
pub use sort::{SortedOrder, TopologicalSorter, describe_order};
