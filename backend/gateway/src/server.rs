//! Main HTTP gateway server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use homh_agent::CompanionAgent;
use homh_store::ChatStore;

use crate::{chat_api, chats_api};

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub agent: CompanionAgent,
    pub store: Arc<dyn ChatStore>,
}

impl GatewayState {
    pub fn new(agent: CompanionAgent, store: Arc<dyn ChatStore>) -> Self {
        Self { agent, store }
    }
}

/// Build the router with every route and the CORS allow-list.
pub fn build_router(state: GatewayState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(chats_api::health))
        .route("/api/chat/stream", post(chat_api::chat_stream))
        .route("/api/personas", get(chats_api::list_personas))
        .route("/api/chats", get(chats_api::list_chats).post(chats_api::save_chat))
        .route("/api/chats/:id", delete(chats_api::delete_chat))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the web client.
///
/// Listed origins may send credentials. `*` allows any origin without
/// credentials, since browsers reject that combination. Unparsable origins are
/// skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any).allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer
        .allow_origin(allowed)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Serve until `shutdown` resolves, then close the chat store.
///
/// The store is closed on every exit, including bind and serve failures. A
/// serve error takes precedence over a close error.
#[instrument(skip(state, cors_origins, shutdown))]
pub async fn start_server<F>(
    addr: SocketAddr,
    state: GatewayState,
    cors_origins: &[String],
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let app = build_router(state, cors_origins);

    let served = serve(addr, app, shutdown).await;
    match &served {
        Ok(()) => info!("HTTP server stopped; closing chat store"),
        Err(e) => error!(error = %format!("{e:#}"), "HTTP server failed; closing chat store"),
    }
    let closed = store.close().await;

    served?;
    closed
}

async fn serve<F>(addr: SocketAddr, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HOMH gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use homh_agent::{PersonaRegistry, PromptCompiler, StreamGenerator, FALLBACK_MESSAGE};
    use homh_core::{ChatTurn, SavedChat};
    use homh_llm::MockProvider;
    use homh_store::SqliteChatStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state_with(provider: MockProvider) -> (GatewayState, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let agent = CompanionAgent::new(
            Arc::new(PersonaRegistry::builtin()),
            Arc::new(PromptCompiler::new().unwrap()),
            StreamGenerator::new(provider.clone()),
        );
        let store = Arc::new(SqliteChatStore::in_memory().unwrap());
        (GatewayState::new(agent, store), provider)
    }

    fn app(state: GatewayState) -> Router {
        build_router(state, &["http://localhost:3000".to_string()])
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_root() {
        let (state, _) = state_with(MockProvider::new("mock"));
        let response = app(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], chats_api::HEALTH_MESSAGE);
    }

    #[tokio::test]
    async fn test_chat_stream_forwards_fragments() {
        let (state, provider) =
            state_with(MockProvider::new("mock").with_fragments(["Hello", " there"]));
        let response = app(state)
            .oneshot(post_json(
                "/api/chat/stream",
                json!({ "message": "I feel anxious", "persona": { "id": "sukun" }, "chatHistory": [] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            chat_api::STREAM_CONTENT_TYPE
        );
        assert_eq!(body_string(response).await, "Hello there");
        assert!(provider.requests()[0].instruction.contains("You are Sukun,"));
    }

    #[tokio::test]
    async fn test_chat_stream_failure_is_in_band() {
        let (state, _) = state_with(
            MockProvider::new("mock")
                .with_fragments(["Hello"])
                .then_fail("upstream reset"),
        );
        let response = app(state)
            .oneshot(post_json("/api/chat/stream", json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("Hello{FALLBACK_MESSAGE}"));
    }

    #[tokio::test]
    async fn test_chat_stream_rejects_empty_and_malformed_requests() {
        let (state, provider) = state_with(MockProvider::new("mock"));
        let router = app(state);

        let empty = router
            .clone()
            .oneshot(post_json("/api/chat/stream", json!({ "message": "   " })))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_str(&body_string(empty).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("message"));

        let malformed = router
            .oneshot(
                Request::post("/api/chat/stream")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_personas_listing() {
        let (state, _) = state_with(MockProvider::new("mock"));
        let response = app(state)
            .oneshot(Request::get("/api/personas").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["mochi"]["name"], "Mochi");
        assert_eq!(body["sukun"]["tone"], "Soothing, wise, and centered");
        assert!(body["diya"]["approach"].is_string());
    }

    #[tokio::test]
    async fn test_saved_chat_lifecycle() {
        let (state, _) = state_with(MockProvider::new("mock"));
        let router = app(state);

        let chat = SavedChat {
            id: "chat-1".to_string(),
            title: "Evening check-in".to_string(),
            messages: vec![ChatTurn::new("user", "hi")],
            persona: None,
            timestamp: 1_700_000_000_000,
        };
        let saved = router
            .clone()
            .oneshot(post_json("/api/chats", serde_json::to_value(&chat).unwrap()))
            .await
            .unwrap();
        assert_eq!(saved.status(), StatusCode::OK);

        let listed = router
            .clone()
            .oneshot(Request::get("/api/chats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let chats: Vec<SavedChat> = serde_json::from_str(&body_string(listed).await).unwrap();
        assert_eq!(chats, vec![chat]);

        let deleted = router
            .clone()
            .oneshot(Request::delete("/api/chats/chat-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);

        let again = router
            .oneshot(Request::delete("/api/chats/chat-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&body_string(again).await).unwrap();
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let (state, _) = state_with(MockProvider::new("mock"));
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/chat/stream")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn test_cors_wildcard_omits_credentials() {
        let (state, _) = state_with(MockProvider::new("mock"));
        let response = build_router(state, &["*".to_string()])
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/chats")
                    .header(header::ORIGIN, "http://elsewhere.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[tokio::test]
    async fn test_bind_failure_still_closes_store() {
        let (state, _) = state_with(MockProvider::new("mock"));
        let store = Arc::clone(&state.store);

        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let result = start_server(addr, state, &[], std::future::pending()).await;
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to bind"));
        assert!(store.list(10).await.is_err());
    }
}
