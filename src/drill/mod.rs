//! Adaptive item selection for drill screens.
//!
//! Contains:
//! - WeightStore - live per-item mastery records
//! - SnapshotStore - persistence boundary with memory and file adapters
//! - Selector - weighted draw with a no-repeat window and direction balancing
//! - apply_outcome - per-answer record update
//! - SnapshotWriter - debounced, retried background saves
//! - DrillEngine - facade and lifecycle, one per dojo

pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod progress;
pub mod registry;
pub mod selector;
pub mod store;
pub mod types;
pub mod updater;
pub mod writer;

pub use config::DrillConfig;
pub use engine::DrillEngine;
pub use error::{DrillError, StorageError};
pub use persistence::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use registry::drill_engine;
pub use types::*;
