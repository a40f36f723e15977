//! API Error Handling
//!
//! Unified error types and conversion for API responses. Every error body is
//! `{"error": message, "kind": ErrorKind}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tandem_core::domain::error::{ErrorBody, ErrorKind};

use crate::repository::TopologyError;
use crate::service::{ReleaseError, SequencerError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(ErrorKind, String),
    BadRequest(ErrorKind, String),
    Conflict(ErrorKind, String),
    InternalError(ErrorKind, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(kind, msg) => (StatusCode::NOT_FOUND, kind, msg),
            ApiError::BadRequest(kind, msg) => (StatusCode::BAD_REQUEST, kind, msg),
            ApiError::Conflict(kind, msg) => (StatusCode::CONFLICT, kind, msg),
            ApiError::InternalError(kind, msg) => {
                tracing::error!("Internal error ({}): {}", kind, msg);
                (StatusCode::INTERNAL_SERVER_ERROR, kind, msg)
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                kind,
            }),
        )
            .into_response()
    }
}

impl From<TopologyError> for ApiError {
    fn from(err: TopologyError) -> Self {
        let kind = err.kind();
        match err {
            TopologyError::InvalidWeight(_) => ApiError::BadRequest(kind, err.to_string()),
            TopologyError::InconsistentTopology(_) => ApiError::Conflict(kind, err.to_string()),
        }
    }
}

impl From<ReleaseError> for ApiError {
    fn from(err: ReleaseError) -> Self {
        let kind = err.kind();
        match err {
            ReleaseError::Topology(e) => e.into(),
            ReleaseError::InvalidRequest(_) => ApiError::BadRequest(kind, err.to_string()),
            ReleaseError::NotFound(_) => ApiError::NotFound(kind, err.to_string()),
            ReleaseError::DeploymentInProgress(_) | ReleaseError::NoActiveDeployment => {
                ApiError::Conflict(kind, err.to_string())
            }
            ReleaseError::Router(_) => ApiError::InternalError(kind, err.to_string()),
        }
    }
}

impl From<SequencerError> for ApiError {
    fn from(err: SequencerError) -> Self {
        let kind = err.kind();
        match err {
            SequencerError::NoActiveRun => ApiError::Conflict(kind, err.to_string()),
            SequencerError::InvalidRequest(_) => ApiError::BadRequest(kind, err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::domain::pool::Weights;
    use uuid::Uuid;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[tokio::test]
    async fn test_error_body_carries_kind() {
        let response = ApiError::from(ReleaseError::NoActiveDeployment).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.kind, ErrorKind::NoActiveDeployment);
        assert_eq!(body.error, "no deployment in progress");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            status_of(TopologyError::InvalidWeight(Weights::new(60, 50))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ReleaseError::DeploymentInProgress(Uuid::new_v4())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ReleaseError::Topology(TopologyError::InconsistentTopology(
                "halted".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ReleaseError::NotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(SequencerError::NoActiveRun), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ReleaseError::Router("timeout".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
