//! Health Check API Handler
//!
//! Liveness endpoint for the orchestrator itself, not the pools.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub deployment_in_progress: bool,
    pub halted: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        deployment_in_progress: state.controller.active_id().is_some(),
        halted: state.registry.snapshot().halted.is_some(),
    })
}
