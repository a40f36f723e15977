//! Repository Module
//!
//! State layer for the orchestrator.
//! Each repository owns the authoritative in-memory record for one domain entity.

pub mod topology;

// Re-export for convenience
pub use topology::{TopologyError, TopologyRegistry};
