//! Core types, errors, and configuration for apbridge.
//!
//! This crate holds everything that reasons about the fetcher's snapshot file:
//! loading it tolerantly, resolving numeric identifiers to names, computing
//! progress, and working out which acquisition events are new or unique.
//! Nothing in here talks to a chat channel.

pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod notability;
pub mod progress;
pub mod resolver;
pub mod snapshot;
pub mod types;

// Re-exports for convenience
pub use config::BridgeConfig;
pub use dedup::{Delta, SeenCounter};
pub use error::{Error, Result};
pub use notability::Notability;
pub use progress::ProgressSnapshot;
pub use resolver::GameLookup;
pub use snapshot::{SnapshotFault, SnapshotStatus, SnapshotStore};
pub use types::*;
