//! Error types for the Tandem client

use tandem_core::domain::error::{ErrorBody, ErrorKind};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Tandem client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error kind reported by the orchestrator, if the body carried one
        kind: Option<ErrorKind>,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from a status code and the raw response body
    ///
    /// Bodies in the orchestrator's `{"error", "kind"}` shape keep their kind;
    /// anything else is passed through as the message.
    pub fn api_error(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => Self::ApiError {
                status,
                kind: Some(parsed.kind),
                message: parsed.error,
            },
            Err(_) => Self::ApiError {
                status,
                kind: None,
                message: body,
            },
        }
    }

    /// Error kind reported by the orchestrator
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ApiError { kind, .. } => *kind,
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Another deployment holds the slot
    pub fn is_deployment_in_progress(&self) -> bool {
        self.kind() == Some(ErrorKind::DeploymentInProgress)
    }

    /// The registry is halted or in an unexpected state
    pub fn is_inconsistent_topology(&self) -> bool {
        self.kind() == Some(ErrorKind::InconsistentTopology)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_kind() {
        let err = ClientError::api_error(
            409,
            r#"{"error":"deployment 1 is already in progress","kind":"deployment_in_progress"}"#,
        );

        assert!(err.is_deployment_in_progress());
        assert!(!err.is_inconsistent_topology());
        assert_eq!(
            err.to_string(),
            "API error (status 409): deployment 1 is already in progress"
        );
    }

    #[test]
    fn test_api_error_plain_body() {
        let err = ClientError::api_error(502, "Bad Gateway");

        assert_eq!(err.kind(), None);
        assert!(err.is_server_error());
        assert!(!err.is_not_found());
    }
}
