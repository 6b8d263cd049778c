//! WebSocket chat endpoint
//!
//! Chat requests arrive as JSON text messages; every frame of the
//! resulting turn is pushed back as a WebSocket envelope. Stream end is
//! signaled by the finish/error frame — closing the connection is the
//! transport-level terminator, there is no DONE sentinel.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use brook_providers::{ChatMessage, ChatOptions};
use brook_stream::{StreamFormat, WireFrame};
use chrono::Utc;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsChatRequest {
    message: String,
    provider_id: Option<String>,
    session_id: Option<String>,
}

/// Upgrade handler for the per-user WebSocket feed
pub async fn websocket_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, query.session_id))
}

async fn handle_socket(
    mut socket: WebSocket,
    state: AppState,
    user_id: String,
    default_session_id: Option<String>,
) {
    info!("WebSocket connection established for user {}", user_id);

    let hello = json!({
        "type": "connection_established",
        "user_id": user_id,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if socket.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let request: WsChatRequest = match serde_json::from_str(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("Malformed WebSocket chat request: {}", e);
                        let error = json!({
                            "type": "error",
                            "error": format!("malformed request: {}", e),
                            "timestamp": Utc::now().to_rfc3339(),
                        });
                        if socket.send(Message::Text(error.to_string())).await.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                let session_id = request.session_id.or_else(|| default_session_id.clone());
                let session = match session_id {
                    Some(id) => match state.manager.get_session(&id).await {
                        Some(session) => session,
                        None => state.manager.create_session(Some(id)).await,
                    },
                    None => state.manager.create_session(None).await,
                };

                let frames = session
                    .stream_chat(
                        vec![ChatMessage::user(&request.message)],
                        request.provider_id,
                        None,
                        StreamFormat::WebSocket,
                        ChatOptions::default(),
                    )
                    .await;

                match frames {
                    Ok(mut frames) => {
                        while let Some(frame) = frames.next().await {
                            if let WireFrame::Json(value) = frame {
                                if socket
                                    .send(Message::Text(value.to_string()))
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let error = json!({
                            "type": "error",
                            "error": e.to_string(),
                            "timestamp": Utc::now().to_rfc3339(),
                        });
                        if socket.send(Message::Text(error.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("WebSocket disconnected for user {}", user_id);
}
