//! Deployment API Handlers
//!
//! HTTP endpoints for the release controller.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tandem_core::domain::deployment::Deployment;
use tandem_core::dto::deployment::{RollbackAccepted, RollbackRequest, StartDeployment};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::state::AppState;

/// POST /deployment/start
/// Start a deployment onto the idle pool
pub async fn start_deployment(
    State(state): State<AppState>,
    Json(req): Json<StartDeployment>,
) -> ApiResult<(StatusCode, Json<Deployment>)> {
    tracing::info!("Starting deployment of {}", req.artifact);

    let deployment = state.controller.start(req.into())?;

    Ok((StatusCode::ACCEPTED, Json(deployment)))
}

/// GET /deployment/current
/// Live deployment, or the most recent one
pub async fn current_deployment(State(state): State<AppState>) -> Json<Option<Deployment>> {
    Json(state.controller.current())
}

/// GET /deployment/list
pub async fn list_deployments(State(state): State<AppState>) -> Json<Vec<Deployment>> {
    Json(state.controller.list())
}

/// GET /deployment/{id}
pub async fn get_deployment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deployment>> {
    tracing::debug!("Getting deployment: {}", id);

    Ok(Json(state.controller.get(id)?))
}

/// POST /deployment/rollback
/// Operator override for the live deployment
pub async fn rollback(
    State(state): State<AppState>,
    Json(req): Json<RollbackRequest>,
) -> ApiResult<(StatusCode, Json<RollbackAccepted>)> {
    let deployment_id = state.controller.rollback(req.reason)?;

    Ok((StatusCode::ACCEPTED, Json(RollbackAccepted { deployment_id })))
}
