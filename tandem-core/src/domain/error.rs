//! Error kinds shared across the orchestrator, client and CLI
//!
//! The orchestrator reports these on the wire next to the error message so
//! callers can react to a specific failure (e.g. queue on a busy controller)
//! without parsing text.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed weight request; fatal to the triggering operation only
    InvalidWeight,
    /// Registry found in an impossible state; automated changes are halted
    InconsistentTopology,
    /// Another deployment is still in flight
    DeploymentInProgress,
    /// Health check failed transiently (timeout, connection refused)
    HealthCheckTransient,
    /// Health check reported the target pool unhealthy
    HealthCheckFailure,
    /// Traffic router rejected or misapplied a weight change
    RouterFailure,
    /// Artifact could not be installed on the target pool
    InstallFailure,
    /// Operator forced a rollback
    OperatorOverride,
    /// Rollback requested with nothing in flight
    NoActiveDeployment,
    /// Pipeline operation with no run to act on
    NoActiveRun,
    NotFound,
    InvalidRequest,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidWeight => "InvalidWeightError",
            ErrorKind::InconsistentTopology => "InconsistentTopologyError",
            ErrorKind::DeploymentInProgress => "DeploymentInProgressError",
            ErrorKind::HealthCheckTransient => "HealthCheckTransientError",
            ErrorKind::HealthCheckFailure => "HealthCheckFailure",
            ErrorKind::RouterFailure => "RouterFailure",
            ErrorKind::InstallFailure => "InstallFailure",
            ErrorKind::OperatorOverride => "OperatorOverride",
            ErrorKind::NoActiveDeployment => "NoActiveDeployment",
            ErrorKind::NoActiveRun => "NoActiveRun",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Error body returned by the orchestrator API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}
