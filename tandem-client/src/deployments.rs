//! Deployment-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use tandem_core::domain::deployment::Deployment;
use tandem_core::dto::deployment::{RollbackAccepted, RollbackRequest, StartDeployment};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Deployment Lifecycle
    // =============================================================================

    /// Start a deployment onto the idle pool
    ///
    /// Returns the `Pending` deployment; the cutover continues in the
    /// orchestrator.
    pub async fn start_deployment(&self, req: StartDeployment) -> Result<Deployment> {
        let url = format!("{}/deployment/start", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Live deployment, or the most recent one
    pub async fn current_deployment(&self) -> Result<Option<Deployment>> {
        let url = format!("{}/deployment/current", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_deployment(&self, id: Uuid) -> Result<Deployment> {
        let url = format!("{}/deployment/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// All deployments, oldest first
    pub async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let url = format!("{}/deployment/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Force the live deployment to roll back
    pub async fn rollback(&self, reason: Option<String>) -> Result<Uuid> {
        let url = format!("{}/deployment/rollback", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RollbackRequest { reason })
            .send()
            .await?;

        let accepted: RollbackAccepted = self.handle_response(response).await?;
        Ok(accepted.deployment_id)
    }
}
