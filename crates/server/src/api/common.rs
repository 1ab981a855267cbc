//! Shared response helpers and request bodies for the HTTP handlers.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use vee_rules::{PipelineError, StoreError};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn error_response(status: u16, message: impl std::fmt::Display) -> ApiError {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!("internal error: {}", e);
    error_response(500, e)
}

pub(crate) fn bad_request(message: impl std::fmt::Display) -> ApiError {
    error_response(400, message)
}

/// Map a StoreError to an HTTP response.
pub(crate) fn store_err(e: StoreError) -> ApiError {
    error_response(e.status_code(), e)
}

/// Map a PipelineError to an HTTP response.
pub(crate) fn pipeline_err(e: PipelineError) -> ApiError {
    error_response(e.status_code(), e)
}

pub(crate) fn to_json(value: impl Serialize) -> ApiResult<Json<Value>> {
    serde_json::to_value(value).map(Json).map_err(internal_error)
}

/// Body of every name-list operation.
#[derive(Debug, Deserialize)]
pub struct NamesRequest {
    pub names: Vec<String>,
}
