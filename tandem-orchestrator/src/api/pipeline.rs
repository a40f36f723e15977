//! Pipeline API Handlers
//!
//! HTTP endpoints for the source/build hooks of the pipeline sequencer.

use axum::{Json, extract::State};
use tandem_core::domain::pipeline::PipelineRun;
use tandem_core::dto::pipeline::{AdvancePipeline, PipelineStatus, SourceChange};

use crate::api::error::ApiResult;
use crate::state::AppState;

/// POST /pipeline/source
/// Returns `null` when a run for the revision is already in progress
pub async fn source_change(
    State(state): State<AppState>,
    Json(req): Json<SourceChange>,
) -> ApiResult<Json<Option<PipelineRun>>> {
    tracing::info!("Source change: {}", req.revision);

    let run = state.sequencer.on_source_change(&req.revision)?;

    Ok(Json(run))
}

/// POST /pipeline/advance
pub async fn advance(
    State(state): State<AppState>,
    Json(req): Json<AdvancePipeline>,
) -> ApiResult<Json<PipelineRun>> {
    Ok(Json(state.sequencer.advance(req.outcome)?))
}

/// GET /pipeline/runs
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<PipelineRun>> {
    Json(state.sequencer.list())
}

/// GET /pipeline/status
pub async fn status(State(state): State<AppState>) -> Json<PipelineStatus> {
    Json(PipelineStatus {
        current: state.sequencer.current(),
        queued: state.sequencer.queued(),
    })
}
