//! Topology-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use tandem_core::domain::pool::{HealthStatus, PoolLabel, Weights};
use tandem_core::dto::topology::{HealthReport, TopologySnapshot};

impl OrchestratorClient {
    /// Current view of both pools
    pub async fn topology(&self) -> Result<TopologySnapshot> {
        let url = format!("{}/topology", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Operator weight change
    ///
    /// Rejected with `DeploymentInProgress` while a deployment is live.
    pub async fn set_weights(&self, weights: Weights) -> Result<TopologySnapshot> {
        let url = format!("{}/topology/weights", self.base_url);
        let response = self.client.post(&url).json(&weights).send().await?;

        self.handle_response(response).await
    }

    /// Push a health signal for one pool
    pub async fn report_health(&self, pool: PoolLabel, status: HealthStatus) -> Result<TopologySnapshot> {
        let url = format!("{}/topology/health", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&HealthReport { pool, status })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Clear a halted registry, recording the weights actually in effect
    pub async fn resolve_topology(&self, weights: Weights) -> Result<TopologySnapshot> {
        let url = format!("{}/topology/resolve", self.base_url);
        let response = self.client.post(&url).json(&weights).send().await?;

        self.handle_response(response).await
    }
}
