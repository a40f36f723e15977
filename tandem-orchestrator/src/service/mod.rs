//! Service Module
//!
//! Business logic layer for the orchestrator: the release controller drives
//! deployments against the topology registry, the pipeline sequencer feeds it.

pub mod pipeline;
pub mod release;

pub use pipeline::{PipelineSequencer, SequencerError};
pub use release::{ReleaseController, ReleaseError, ReleaseRequest, ReleaseSettings};
