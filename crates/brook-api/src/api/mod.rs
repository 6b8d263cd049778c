//! API router and shared state

use axum::Router;
use axum::routing::{get, post};
use brook_common::StreamingConfig;
use brook_stream::StreamingChatManager;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod providers;
pub mod streaming;
pub mod ws;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<StreamingChatManager>,
    pub streaming_config: StreamingConfig,
}

impl AppState {
    pub fn new(manager: Arc<StreamingChatManager>) -> Self {
        Self {
            manager,
            streaming_config: StreamingConfig::default(),
        }
    }
}

/// Build the full API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/streaming/chat", post(streaming::streaming_chat))
        .route(
            "/api/streaming/chat/:agent_id",
            post(streaming::agent_streaming_chat),
        )
        .route(
            "/api/streaming/multi-stream",
            post(streaming::multi_streaming_chat),
        )
        .route("/api/streaming/stats", get(streaming::streaming_stats))
        .route(
            "/api/streaming/sessions/:session_id/stats",
            get(streaming::session_stats),
        )
        .route(
            "/api/streaming/stream-formats",
            get(streaming::list_stream_formats),
        )
        .route("/api/streaming/providers", get(providers::list_providers))
        .route(
            "/api/streaming/providers/register",
            post(providers::register_provider),
        )
        .route(
            "/api/streaming/providers/health",
            get(providers::providers_health),
        )
        .route("/api/streaming/ws/:user_id", get(ws::websocket_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
