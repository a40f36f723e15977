//! Topology API Handlers
//!
//! HTTP endpoints for inspecting and steering the two pools.

use axum::{Json, extract::State};
use tandem_core::domain::pool::Weights;
use tandem_core::dto::topology::{HealthReport, TopologySnapshot};

use crate::api::error::ApiResult;
use crate::state::AppState;

/// GET /topology
pub async fn get_topology(State(state): State<AppState>) -> Json<TopologySnapshot> {
    Json(state.registry.snapshot())
}

/// POST /topology/weights
/// Operator weight change, refused while a deployment is in flight
pub async fn set_weights(
    State(state): State<AppState>,
    Json(weights): Json<Weights>,
) -> ApiResult<Json<TopologySnapshot>> {
    tracing::info!("Setting weights: {}", weights);

    state.controller.set_weights(weights).await?;

    Ok(Json(state.registry.snapshot()))
}

/// POST /topology/health
/// Pushed health signal for one pool
pub async fn report_health(
    State(state): State<AppState>,
    Json(report): Json<HealthReport>,
) -> Json<TopologySnapshot> {
    if state.registry.mark_health(report.pool, report.status) {
        tracing::info!("Health report: {} pool is {}", report.pool, report.status);
    }

    Json(state.registry.snapshot())
}

/// POST /topology/resolve
/// Clears a halt once the router confirms the given weights
pub async fn resolve(
    State(state): State<AppState>,
    Json(weights): Json<Weights>,
) -> ApiResult<Json<TopologySnapshot>> {
    tracing::warn!("Operator resolving topology to {}", weights);

    state.controller.resolve(weights).await?;

    Ok(Json(state.registry.snapshot()))
}
