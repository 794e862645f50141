//! Error responses. Clients get a kind, a message and whether retrying makes
//! sense; internals stay in the logs.

use crate::analysis::AnalysisError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(anyhow::anyhow!("analysis task failed: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, retryable) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", false),
            ApiError::Analysis(AnalysisError::InvalidRange { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_range", false)
            }
            ApiError::Analysis(AnalysisError::DataUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "data_unavailable", true)
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", true),
        };

        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = %format!("{:#}", e), "request failed");
                "internal error".to_string()
            }
            other => {
                warn!(error = %other, kind, "request rejected");
                other.to_string()
            }
        };

        let body = json!({
            "error": {
                "kind": kind,
                "message": message,
                "retryable": retryable,
            }
        });
        (status, Json(body)).into_response()
    }
}
