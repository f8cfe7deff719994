// src/config/mod.rs

//! Manifest configuration.
//!
//! A TOML manifest describes a simulated startup graph plus the scheduler
//! settings. [`loader`] reads it, [`validate`] turns a [`RawManifest`] into a
//! checked [`Manifest`], and [`Manifest::into_builder`] produces a
//! ready-to-build `SchedulerBuilder`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{AnchorConfig, Manifest, RawManifest, SchedulerConfig, TaskConfig};
