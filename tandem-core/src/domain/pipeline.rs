//! Pipeline run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One traversal of Source -> Build -> Deploy
///
/// Owned by the pipeline sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub revision: String,

    /// Build artifact reference, empty until the build stage succeeds
    pub artifact: Option<String>,

    pub stage: PipelineStage,
    pub status: RunStatus,

    /// Outcome of every finished stage, in stage order
    pub outcomes: Vec<StageRecord>,

    /// Deployment created for this run once it reached the deploy stage
    pub deployment_id: Option<Uuid>,

    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(revision: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            revision,
            artifact: None,
            stage: PipelineStage::Source,
            status: RunStatus::InProgress,
            outcomes: Vec::new(),
            deployment_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the outcome of the current stage
    pub fn record(&mut self, outcome: StageOutcome) {
        self.outcomes.push(StageRecord {
            stage: self.stage,
            outcome,
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Non-terminal status change
    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Terminal status with a reason
    pub fn finish(&mut self, status: RunStatus, reason: Option<String>) {
        self.status = status;
        self.failure_reason = reason;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fixed stage order: Source -> Build -> Deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Source,
    Build,
    Deploy,
}

impl PipelineStage {
    /// The stage that follows this one, if any
    pub fn next(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Source => Some(PipelineStage::Build),
            PipelineStage::Build => Some(PipelineStage::Deploy),
            PipelineStage::Deploy => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Source or build stage still running
    InProgress,
    /// Build succeeded; waiting for the in-flight deployment to finish
    Queued,
    /// Handed off to the release controller
    Deploying,
    Succeeded,
    Failed,
    /// Replaced by a run for a newer revision
    Superseded,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Superseded
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result reported by the source/build system for the current stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded {
        /// Artifact produced by the stage (required for Build)
        #[serde(default)]
        artifact: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub outcome: StageOutcome,
    pub at: DateTime<Utc>,
}
