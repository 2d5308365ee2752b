//! Saved chats, persona listing and the health root.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use homh_agent::PersonaRegistry;
use homh_core::SavedChat;
use homh_store::DEFAULT_LIST_LIMIT;

use crate::error::ApiError;
use crate::server::GatewayState;

pub const HEALTH_MESSAGE: &str = "HOMH Backend is online and ready!";

/// Handler for `GET /`.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": HEALTH_MESSAGE }))
}

/// Handler for `GET /api/personas`.
pub async fn list_personas(State(state): State<GatewayState>) -> Json<PersonaRegistry> {
    Json(state.agent.registry().as_ref().clone())
}

/// Handler for `GET /api/chats`.
pub async fn list_chats(State(state): State<GatewayState>) -> Result<Json<Vec<SavedChat>>, ApiError> {
    let chats = state.store.list(DEFAULT_LIST_LIMIT).await?;
    Ok(Json(chats))
}

/// Handler for `POST /api/chats`.
pub async fn save_chat(
    State(state): State<GatewayState>,
    payload: Result<Json<SavedChat>, JsonRejection>,
) -> Result<Json<SavedChat>, ApiError> {
    let Json(chat) = payload?;
    let saved = state.store.save(chat).await?;
    info!(chat_id = %saved.id, messages = saved.messages.len(), "Chat saved");
    Ok(Json(saved))
}

/// Handler for `DELETE /api/chats/:id`.
pub async fn delete_chat(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete(&id).await?;
    info!(chat_id = %id, "Chat deleted");
    Ok(Json(json!({ "status": "deleted", "id": id })))
}
