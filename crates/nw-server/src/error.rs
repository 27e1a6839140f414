use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nw_core::{GenerationError, JobError};
use serde_json::json;

/// Error body every failing route answers with.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.message,
            "code": self.code,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        let status = match e {
            GenerationError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            GenerationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GenerationError::GenerationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &e {
            GenerationError::ModelNotLoaded => {
                "Model not loaded. Please train a model first.".to_string()
            }
            GenerationError::InvalidInput(msg) => msg.clone(),
            other => other.to_string(),
        };
        Self {
            status,
            code: e.code(),
            message,
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = match e {
            JobError::AlreadyRunning | JobError::NotRunning | JobError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            JobError::SupervisorGone | JobError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: e.code(),
            message: e.to_string(),
        }
    }
}
