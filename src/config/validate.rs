// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{BootdagError, Result};

impl TryFrom<RawManifest> for Manifest {
    type Error = BootdagError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw))
    }
}

fn validate_raw_manifest(cfg: &RawManifest) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_scheduler_config(cfg)?;
    ensure_unique_tags(cfg)?;
    validate_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawManifest) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BootdagError::ConfigError(
            "manifest must contain at least one [task.<tag>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_config(cfg: &RawManifest) -> Result<()> {
    let c = &cfg.config;
    if c.worker_threads == 0 {
        return Err(BootdagError::ConfigError(
            "[config].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.queue_capacity == 0 {
        return Err(BootdagError::ConfigError(
            "[config].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.caller_wait_timeout_ms == 0 {
        return Err(BootdagError::ConfigError(
            "[config].caller_wait_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.task_wait_timeout_ms == 0 {
        return Err(BootdagError::ConfigError(
            "[config].task_wait_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn ensure_unique_tags(cfg: &RawManifest) -> Result<()> {
    for tag in cfg.task.keys().chain(cfg.anchor.keys()) {
        if tag.trim().is_empty() {
            return Err(BootdagError::EmptyTag);
        }
    }
    if let Some(tag) = cfg.anchor.keys().find(|t| cfg.task.contains_key(*t)) {
        return Err(BootdagError::DuplicateTag(tag.clone()));
    }
    Ok(())
}

/// `(tag, after)` for every task and anchor.
fn edges(cfg: &RawManifest) -> impl Iterator<Item = (&String, &Vec<String>)> {
    cfg.task
        .iter()
        .map(|(tag, t)| (tag, &t.after))
        .chain(cfg.anchor.iter().map(|(tag, a)| (tag, &a.after)))
}

fn validate_dependencies(cfg: &RawManifest) -> Result<()> {
    let known: BTreeSet<&str> = cfg
        .task
        .keys()
        .chain(cfg.anchor.keys())
        .map(String::as_str)
        .collect();

    for (tag, after) in edges(cfg) {
        for dep in after {
            if dep == tag {
                return Err(BootdagError::SelfDependency(tag.clone()));
            }
            if !known.contains(dep.as_str()) {
                return Err(BootdagError::UnknownDependency {
                    task: tag.clone(),
                    missing: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawManifest) -> Result<()> {
    // Edge direction: dep -> tag.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for tag in cfg.task.keys().chain(cfg.anchor.keys()) {
        graph.add_node(tag.as_str());
    }
    for (tag, after) in edges(cfg) {
        for dep in after {
            graph.add_edge(dep.as_str(), tag.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BootdagError::DagCycle(vec![cycle.node_id().to_string()])),
    }
}
