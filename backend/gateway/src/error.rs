//! HTTP error mapping. Every error body has the shape `{"detail": "..."}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use homh_core::HomhError;
use homh_logging::redact_sensitive_data;

/// Detail returned for every 500. The cause is only logged.
pub const INTERNAL_ERROR_DETAIL: &str = "Internal server error";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    /// Log the cause server-side and answer with a generic 500.
    pub fn internal(cause: &str) -> Self {
        error!(error = %redact_sensitive_data(cause), "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<HomhError> for ApiError {
    fn from(err: HomhError) -> Self {
        match err {
            HomhError::InvalidRequest(detail) => Self::unprocessable(detail),
            HomhError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, format!("{what} not found")),
            other => Self::internal(&other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<HomhError>() {
            Ok(typed) => typed.into(),
            Err(err) => Self::internal(&format!("{err:#}")),
        }
    }
}

/// Undecodable request bodies are validation errors, whatever axum's own status would be.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
