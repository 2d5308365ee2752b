//! HOMH Gateway HTTP API Server
//!
//! Streams companion responses and serves the persona list and saved chats.

pub mod chat_api;
pub mod chats_api;
pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, cors_layer, start_server, GatewayState};
