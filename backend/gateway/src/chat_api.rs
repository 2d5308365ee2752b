//! Streaming chat endpoint (`POST /api/chat/stream`).
//!
//! The response is plain text written fragment by fragment. Once the body has
//! started, failures are reported in-band by the fallback fragment; only
//! request validation can still produce an HTTP error.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use tracing::debug;

use homh_core::ChatRequest;

use crate::error::ApiError;
use crate::server::GatewayState;

pub const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Handler for `POST /api/chat/stream`.
pub async fn chat_stream(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    request.validate()?;
    debug!(
        persona_id = request.persona.id.as_deref().unwrap_or_default(),
        "Chat stream requested"
    );

    let body = state
        .agent
        .respond(&request)
        .map(|fragment| Ok::<_, Infallible>(Bytes::from(fragment)));

    Ok((
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
