//! Streaming chat endpoints
//!
//! SSE-family formats are served as `text/event-stream`; the WebSocket
//! envelope format is served as newline-delimited JSON for plain HTTP
//! consumers (and natively over the WebSocket route).

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use brook_common::BrookError;
use brook_providers::{ChatMessage, ChatOptions, ToolSpec};
use brook_stream::{
    FrameStream, StreamAggregator, StreamFormat, StreamingChatSession, WireFrame,
};
use chrono::Utc;
use futures::stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ApiChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ApiChatMessage>,
    pub provider_id: Option<String>,
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(default)]
    pub stream_format: StreamFormat,
    pub session_id: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AgentChatRequest {
    pub message: String,
    pub provider_id: Option<String>,
    #[serde(default)]
    pub stream_format: StreamFormat,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultiStreamEntry {
    pub stream_id: Option<String>,
    pub messages: Vec<ApiChatMessage>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultiStreamRequest {
    pub streams: Vec<MultiStreamEntry>,
}

/// Convert API chat messages to the internal format
pub fn to_chat_messages(messages: &[ApiChatMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| match msg.role.as_str() {
            "system" => ChatMessage::System {
                content: msg.content.clone(),
            },
            "assistant" => ChatMessage::Assistant {
                content: msg.content.clone(),
            },
            // Fallback: treat as user message
            _ => ChatMessage::User {
                content: msg.content.clone(),
            },
        })
        .collect()
}

fn error_status(error: &BrookError) -> StatusCode {
    match error {
        BrookError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BrookError::Provider(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve a session frame stream in the requested format. Native frames
/// only exist in-process, so over HTTP they degrade to the envelope
/// rendering.
fn frame_response(frames: FrameStream, format: StreamFormat) -> Response {
    if format.uses_done_sentinel() {
        let events = frames.map(|frame| {
            let payload = match frame {
                WireFrame::Text(text) => text
                    .strip_prefix("data: ")
                    .and_then(|rest| rest.strip_suffix("\n\n"))
                    .map(str::to_string)
                    .unwrap_or(text),
                WireFrame::Json(value) => value.to_string(),
                WireFrame::Event(event) => event.to_websocket_envelope().to_string(),
            };
            Ok::<_, Infallible>(Event::default().data(payload))
        });

        Sse::new(events)
            .keep_alive(
                KeepAlive::new()
                    .interval(Duration::from_secs(15))
                    .text("keep-alive-text"),
            )
            .into_response()
    } else {
        let lines = frames.map(|frame| {
            let line = match frame {
                WireFrame::Json(value) => value.to_string(),
                WireFrame::Text(text) => text,
                WireFrame::Event(event) => event.to_websocket_envelope().to_string(),
            };
            Ok::<_, Infallible>(format!("{}\n", line))
        });

        (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(lines),
        )
            .into_response()
    }
}

async fn resolve_session(
    state: &AppState,
    session_id: Option<String>,
) -> Arc<StreamingChatSession> {
    match session_id {
        Some(id) => match state.manager.get_session(&id).await {
            Some(session) => session,
            None => state.manager.create_session(Some(id)).await,
        },
        None => state.manager.create_session(None).await,
    }
}

/// Handler for the streaming chat endpoint
pub async fn streaming_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    info!(
        "Streaming chat request ({} messages, format {})",
        request.messages.len(),
        request.stream_format
    );

    let session = resolve_session(&state, request.session_id.clone()).await;
    let options = ChatOptions {
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    };

    let frames = session
        .stream_chat(
            to_chat_messages(&request.messages),
            request.provider_id.clone(),
            request.tools.clone(),
            request.stream_format,
            options,
        )
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;

    Ok(frame_response(frames, request.stream_format))
}

/// Handler for agent streaming chat
pub async fn agent_streaming_chat(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(request): Json<AgentChatRequest>,
) -> Result<Response, (StatusCode, String)> {
    info!("Agent streaming chat request for agent {}", agent_id);

    let options = ChatOptions::default();
    let frames = state
        .manager
        .stream_chat_with_agent(
            &agent_id,
            &request.message,
            request.session_id.clone(),
            request.provider_id.clone(),
            request.stream_format,
            request.user_id.clone(),
            options,
        )
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;

    Ok(frame_response(frames, request.stream_format))
}

/// Handler for concurrent multi-stream chat: every entry runs as its own
/// session and the merged, stream-annotated feed is served as SSE.
pub async fn multi_streaming_chat(
    State(state): State<AppState>,
    Json(request): Json<MultiStreamRequest>,
) -> Result<Response, (StatusCode, String)> {
    info!("Multi-stream chat with {} streams", request.streams.len());

    let aggregator = StreamAggregator::new(state.streaming_config.aggregator_queue_capacity);

    for (index, entry) in request.streams.into_iter().enumerate() {
        let stream_id = entry
            .stream_id
            .unwrap_or_else(|| format!("stream_{}", index));
        let session = state.manager.create_session(None).await;

        let frames = session
            .stream_chat(
                to_chat_messages(&entry.messages),
                entry.provider_id,
                None,
                StreamFormat::WebSocket,
                ChatOptions::default(),
            )
            .await
            .map_err(|e| (error_status(&e), e.to_string()))?;

        let source = frames.filter_map(|frame| async move {
            match frame {
                WireFrame::Json(value) => Some(Ok(value)),
                _ => None,
            }
        });
        aggregator.add_stream(stream_id, source).await;
    }

    let events = aggregator
        .aggregated_events()
        .map(|value| Ok::<_, Infallible>(Event::default().data(value.to_string())))
        .chain(stream::once(async {
            Ok(Event::default().data("[DONE]"))
        }));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response())
}

/// Streaming statistics across sessions and providers
pub async fn streaming_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.manager.registry().health_check_all().await;
    Json(json!({
        "streaming_stats": {
            "active_sessions": state.manager.active_sessions_count().await,
        },
        "provider_stats": health,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Stats projection for one session
pub async fn session_stats(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.manager.session_stats(&session_id).await {
        Some(stats) => Ok(Json(json!({
            "session_id": stats.session_id,
            "start_time": stats.start_time.to_rfc3339(),
            "duration_seconds": stats.duration_seconds,
            "events_count": stats.events_count,
            "usage_stats": stats.usage,
        }))),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("session not found: {}", session_id),
        )),
    }
}

/// Advertise the supported stream formats
pub async fn list_stream_formats() -> Json<serde_json::Value> {
    let formats: Vec<serde_json::Value> = [
        StreamFormat::Sse,
        StreamFormat::WebSocket,
        StreamFormat::AiSdkV5,
        StreamFormat::Native,
    ]
    .iter()
    .map(|format| {
        json!({
            "format": format.to_string(),
            "content_type": format.content_type(),
            "done_sentinel": format.uses_done_sentinel(),
        })
    })
    .collect();

    let total_count = formats.len();
    Json(json!({
        "stream_formats": formats,
        "total_count": total_count,
    }))
}
