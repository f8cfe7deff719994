// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Read and deserialize a manifest without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw: RawManifest = toml::from_str(&contents)?;
    debug!(path = %path.display(), tasks = raw.task.len(), anchors = raw.anchor.len(), "manifest loaded");
    Ok(raw)
}

/// Read a manifest and validate it: at least one task, sane `[config]`,
/// unique tags, known dependencies, no self-dependencies, no cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let raw = load_from_path(&path)?;
    Manifest::try_from(raw)
}
