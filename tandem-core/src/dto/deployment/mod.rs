//! Deployment DTOs

use serde::{Deserialize, Serialize};

/// Request to start a blue/green deployment
///
/// Unset fields fall back to the orchestrator's configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartDeployment {
    pub artifact: String,
    #[serde(default)]
    pub traffic_steps: Vec<u8>,
    #[serde(default)]
    pub evaluation_interval_secs: Option<u64>,
    #[serde(default)]
    pub termination_wait_secs: Option<u64>,
}

/// Operator rollback request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Acknowledgement of an operator rollback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackAccepted {
    pub deployment_id: uuid::Uuid,
}
