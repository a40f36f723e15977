//! Pipeline-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use tandem_core::domain::pipeline::{PipelineRun, StageOutcome};
use tandem_core::dto::pipeline::{AdvancePipeline, PipelineStatus, SourceChange};

impl OrchestratorClient {
    /// Report a new source revision
    ///
    /// Returns `None` when a run for the same revision is already in progress.
    pub async fn trigger_pipeline(&self, revision: impl Into<String>) -> Result<Option<PipelineRun>> {
        let url = format!("{}/pipeline/source", self.base_url);
        let req = SourceChange {
            revision: revision.into(),
        };
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Report the outcome of the active run's current stage
    pub async fn advance_pipeline(&self, outcome: StageOutcome) -> Result<PipelineRun> {
        let url = format!("{}/pipeline/advance", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AdvancePipeline { outcome })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// All pipeline runs, oldest first
    pub async fn list_pipeline_runs(&self) -> Result<Vec<PipelineRun>> {
        let url = format!("{}/pipeline/runs", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Current and queued runs
    pub async fn pipeline_status(&self) -> Result<PipelineStatus> {
        let url = format!("{}/pipeline/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
