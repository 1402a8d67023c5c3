//! Error types for ayur-api
//!
//! Every failure leaves the service as `{"error": "<message>"}` with the
//! matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::pipeline::PipelineError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Identification pipeline failure
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::IdentifyFailed(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Pipeline(PipelineError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Pipeline(PipelineError::InvalidImage(reason)) => {
                warn!(reason = %reason, "Rejected upload");
            }
            _ if status.is_server_error() => {
                error!(error = %self, "Request failed");
            }
            _ => {
                warn!(error = %self, "Bad request");
            }
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
