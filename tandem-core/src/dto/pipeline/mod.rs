//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::{PipelineRun, StageOutcome};

/// Source change notification from the source provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceChange {
    pub revision: String,
}

/// Outcome of the active run's current stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancePipeline {
    pub outcome: StageOutcome,
}

/// Runs currently owned by the sequencer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    /// Run in the source/build stages, or else the deploying run
    pub current: Option<PipelineRun>,
    /// Built run waiting for the deployment slot
    pub queued: Option<PipelineRun>,
}
