//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod deployment;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod topology;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Topology endpoints
        .route("/topology", get(topology::get_topology))
        .route("/topology/weights", post(topology::set_weights))
        .route("/topology/health", post(topology::report_health))
        .route("/topology/resolve", post(topology::resolve))
        // Deployment endpoints
        .route("/deployment/start", post(deployment::start_deployment))
        .route("/deployment/current", get(deployment::current_deployment))
        .route("/deployment/list", get(deployment::list_deployments))
        .route("/deployment/rollback", post(deployment::rollback))
        .route("/deployment/{id}", get(deployment::get_deployment))
        // Pipeline endpoints
        .route("/pipeline/source", post(pipeline::source_change))
        .route("/pipeline/advance", post(pipeline::advance))
        .route("/pipeline/runs", get(pipeline::list_runs))
        .route("/pipeline/status", get(pipeline::status))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
