//! Streaming chat session
//!
//! One session orchestrates one chat turn at a time: it resolves a
//! provider, announces metadata, drives the normalizer over the
//! provider's event source from a dedicated task, and feeds rendered
//! frames through a bounded channel. The consumer cancels by dropping
//! the frame stream; nothing escapes the task boundary — a mid-stream
//! provider failure still yields a well-formed terminal error frame.

use crate::event::{EventPayload, SessionMetadata, StreamEvent};
use crate::format::{DONE_FRAME, StreamFormat, WireFrame};
use crate::normalizer::EventNormalizer;
use brook_common::{BrookError, StreamingConfig, UsageStats};
use brook_providers::{
    ChatMessage, ChatOptions, ProviderEvent, ProviderEventStream, ProviderRegistry, ToolSpec,
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Read-only projection of a session's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub events_count: usize,
    pub usage: UsageStats,
}

/// The lazy frame sequence a chat turn produces
pub struct FrameStream {
    receiver: ReceiverStream<WireFrame>,
    session_id: String,
}

impl FrameStream {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Stream for FrameStream {
    type Item = WireFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// Shared session state the drive task appends to while the consumer
/// holds the session handle
struct SessionLog {
    events: RwLock<Vec<StreamEvent>>,
    usage: RwLock<UsageStats>,
}

impl SessionLog {
    /// Append to the log, render, and forward one event. Returns false
    /// once the consumer has dropped the frame stream.
    async fn emit(
        &self,
        event: StreamEvent,
        format: StreamFormat,
        frame_tx: &mpsc::Sender<WireFrame>,
    ) -> bool {
        let frame = event.render(format);
        self.events.write().await.push(event);
        frame_tx.send(frame).await.is_ok()
    }
}

/// One streaming chat session
pub struct StreamingChatSession {
    session_id: String,
    start_time: DateTime<Utc>,
    registry: Arc<ProviderRegistry>,
    config: StreamingConfig,
    log: Arc<SessionLog>,
}

impl StreamingChatSession {
    pub fn new(
        session_id: impl Into<String>,
        registry: Arc<ProviderRegistry>,
        config: StreamingConfig,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            start_time: Utc::now(),
            registry,
            config,
            log: Arc::new(SessionLog {
                events: RwLock::new(Vec::new()),
                usage: RwLock::new(UsageStats::default()),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Run one chat turn against a provider, returning the lazy frame
    /// sequence in the requested format.
    ///
    /// Provider resolution happens here, before any frame is produced:
    /// an omitted `provider_id` picks the best provider supporting
    /// streaming (and tools when tools are offered), and an unresolvable
    /// provider is a synchronous error, not an error frame.
    pub async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        provider_id: Option<String>,
        tools: Option<Vec<ToolSpec>>,
        format: StreamFormat,
        options: ChatOptions,
    ) -> Result<FrameStream, BrookError> {
        let provider_id = match provider_id {
            Some(id) => id,
            None => {
                let mut required = vec!["streaming"];
                if tools.as_ref().is_some_and(|tools| !tools.is_empty()) {
                    required.push("tools");
                }
                self.registry.best_provider_for(&required).await?
            }
        };

        let adapter = self.registry.get(Some(&provider_id)).await?;
        let source = adapter
            .stream_chat(&messages, tools.as_deref(), &options)
            .await
            .map_err(|e| BrookError::Provider(e.to_string()))?;

        let metadata = SessionMetadata {
            session_id: self.session_id.clone(),
            provider_id,
            model_name: adapter.model_name().to_string(),
            start_time: self.start_time,
        };

        Ok(self.stream_events(source, metadata, format))
    }

    /// Drive an already-opened event source through this session. Shared
    /// by the provider path and the agent-native path so both honor the
    /// same lifecycle invariants and framing.
    pub fn stream_events(
        &self,
        source: ProviderEventStream,
        metadata: SessionMetadata,
        format: StreamFormat,
    ) -> FrameStream {
        let (frame_tx, frame_rx) = mpsc::channel(self.config.channel_capacity);
        let log = Arc::clone(&self.log);
        let session_id = self.session_id.clone();
        let start_time = self.start_time;

        tokio::spawn(async move {
            drive(log, session_id, start_time, source, metadata, format, frame_tx).await;
        });

        FrameStream {
            receiver: ReceiverStream::new(frame_rx),
            session_id: self.session_id.clone(),
        }
    }

    /// Read-only stats projection; never mutates session state
    pub async fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            duration_seconds: (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0,
            events_count: self.log.events.read().await.len(),
            usage: self.log.usage.read().await.clone(),
        }
    }

    /// Snapshot of the append-only event log
    pub async fn event_log(&self) -> Vec<StreamEvent> {
        self.log.events.read().await.clone()
    }
}

/// The session drive task: normalize, log, render, forward. Nothing may
/// escape this function — every failure path ends in a terminal frame.
async fn drive(
    log: Arc<SessionLog>,
    session_id: String,
    start_time: DateTime<Utc>,
    mut source: ProviderEventStream,
    metadata: SessionMetadata,
    format: StreamFormat,
    frame_tx: mpsc::Sender<WireFrame>,
) {
    let mut normalizer = EventNormalizer::new();

    let metadata_event = StreamEvent::new(EventPayload::Metadata(metadata));
    if !log.emit(metadata_event, format, &frame_tx).await {
        return;
    }

    let mut failed = false;
    while let Some(item) = source.next().await {
        match item {
            Ok(event) => {
                if let ProviderEvent::Usage(usage) = &event {
                    log.usage.write().await.merge(usage);
                }
                for canonical in normalizer.normalize(event) {
                    if !log.emit(canonical, format, &frame_tx).await {
                        return;
                    }
                }
            }
            Err(e) => {
                // One terminal error frame, then stop; retries belong to
                // the provider adapter.
                warn!("Stream error in session {}: {}", session_id, e);
                for canonical in normalizer.fail(&e.to_string()) {
                    if !log.emit(canonical, format, &frame_tx).await {
                        return;
                    }
                }
                failed = true;
                break;
            }
        }
    }

    if !failed {
        for canonical in normalizer.close() {
            if !log.emit(canonical, format, &frame_tx).await {
                return;
            }
        }

        let total_events = log.events.read().await.len();
        let duration_seconds = (Utc::now() - start_time).num_milliseconds() as f64 / 1000.0;
        let usage = log.usage.read().await.clone();
        let finish = StreamEvent::new(EventPayload::Finish {
            total_events,
            duration_seconds,
            usage,
        });
        if !log.emit(finish, format, &frame_tx).await {
            return;
        }
    }

    if format.uses_done_sentinel() {
        let _ = frame_tx.send(WireFrame::Text(DONE_FRAME.to_string())).await;
    }

    debug!(
        "Session {} stream complete ({} events, failed: {})",
        session_id,
        log.events.read().await.len(),
        failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StreamEventKind;
    use async_trait::async_trait;
    use brook_common::ProviderType;
    use brook_providers::ProviderAdapter;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Provider that replays a scripted event sequence
    struct ScriptedProvider {
        script: Mutex<Option<Vec<Result<ProviderEvent, anyhow::Error>>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ProviderEvent, anyhow::Error>>) -> Self {
            Self {
                script: Mutex::new(Some(script)),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        async fn stream_chat(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolSpec]>,
            _options: &ChatOptions,
        ) -> anyhow::Result<ProviderEventStream> {
            let script = self
                .script
                .lock()
                .unwrap()
                .take()
                .expect("scripted provider already consumed");
            Ok(Box::pin(futures::stream::iter(script)))
        }

        fn supports_feature(&self, feature: &str) -> bool {
            matches!(feature, "streaming" | "tools")
        }

        fn model_name(&self) -> &str {
            "scripted-model"
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::Local
        }
    }

    async fn session_with_script(
        script: Vec<Result<ProviderEvent, anyhow::Error>>,
    ) -> StreamingChatSession {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register("scripted", Arc::new(ScriptedProvider::new(script)))
            .await;
        StreamingChatSession::new("test-session", registry, StreamingConfig::default())
    }

    fn sse_type(frame: &WireFrame) -> Value {
        let text = frame.as_text().expect("expected a text frame");
        if text == DONE_FRAME {
            return json!("[DONE]");
        }
        let payload: Value = serde_json::from_str(
            text.strip_prefix("data: ")
                .unwrap()
                .strip_suffix("\n\n")
                .unwrap(),
        )
        .unwrap();
        payload["type"].clone()
    }

    #[tokio::test]
    async fn full_turn_renders_the_canonical_v5_sequence() {
        let session = session_with_script(vec![
            Ok(ProviderEvent::TextDelta {
                content: "Hel".to_string(),
            }),
            Ok(ProviderEvent::TextDelta {
                content: "lo".to_string(),
            }),
            Ok(ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: Some("search".to_string()),
                args_fragment: "{\"q\":".to_string(),
            }),
            Ok(ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: None,
                args_fragment: "\"x\"}".to_string(),
            }),
            Ok(ProviderEvent::ToolCallAvailable {
                tool_call_id: "t1".to_string(),
                tool_name: "search".to_string(),
                input: json!({"q": "x"}),
            }),
            Ok(ProviderEvent::ToolResult {
                tool_call_id: "t1".to_string(),
                output: json!("ok"),
            }),
            Ok(ProviderEvent::Finish {
                reason: "stop".to_string(),
            }),
        ])
        .await;

        let frames: Vec<WireFrame> = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::AiSdkV5,
                ChatOptions::default(),
            )
            .await
            .unwrap()
            .collect()
            .await;

        let types: Vec<Value> = frames.iter().map(sse_type).collect();
        assert_eq!(
            types,
            vec![
                json!("metadata"),
                json!("text-start"),
                json!("text-delta"),
                json!("text-delta"),
                json!("text-end"),
                json!("tool-input-start"),
                json!("tool-input-delta"),
                json!("tool-input-delta"),
                json!("tool-input-available"),
                json!("tool-output-available"),
                json!("finish"),
                json!("[DONE]"),
            ]
        );
    }

    #[tokio::test]
    async fn mid_stream_failure_closes_the_part_then_errors() {
        let session = session_with_script(vec![
            Ok(ProviderEvent::TextDelta {
                content: "par".to_string(),
            }),
            Ok(ProviderEvent::TextDelta {
                content: "tial".to_string(),
            }),
            Err(anyhow::anyhow!("connection reset")),
        ])
        .await;

        let frames: Vec<WireFrame> = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::AiSdkV5,
                ChatOptions::default(),
            )
            .await
            .unwrap()
            .collect()
            .await;

        let types: Vec<Value> = frames.iter().map(sse_type).collect();
        assert_eq!(
            types,
            vec![
                json!("metadata"),
                json!("text-start"),
                json!("text-delta"),
                json!("text-delta"),
                json!("text-end"),
                json!("error"),
                json!("[DONE]"),
            ]
        );
    }

    #[tokio::test]
    async fn last_frame_before_done_is_finish_or_error() {
        let session = session_with_script(vec![
            Ok(ProviderEvent::TextDelta {
                content: "x".to_string(),
            }),
            Ok(ProviderEvent::Finish {
                reason: "stop".to_string(),
            }),
        ])
        .await;
        let frames: Vec<WireFrame> = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::Sse,
                ChatOptions::default(),
            )
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.last().unwrap().as_text(), Some(DONE_FRAME));
        assert_eq!(sse_type(&frames[frames.len() - 2]), json!("finish"));
    }

    #[tokio::test]
    async fn websocket_format_has_no_done_sentinel() {
        let session = session_with_script(vec![Ok(ProviderEvent::Finish {
            reason: "stop".to_string(),
        })])
        .await;

        let frames: Vec<WireFrame> = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::WebSocket,
                ChatOptions::default(),
            )
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.len(), 2); // metadata + finish
        let finish = frames.last().unwrap().as_json().unwrap();
        assert_eq!(finish["type"], "finish");
    }

    #[tokio::test]
    async fn unresolvable_provider_errors_before_any_frame() {
        let registry = Arc::new(ProviderRegistry::new());
        let session = StreamingChatSession::new("s1", registry, StreamingConfig::default());

        let result = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::Sse,
                ChatOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(BrookError::Config(_))));
        assert_eq!(session.stats().await.events_count, 0);
    }

    #[tokio::test]
    async fn stats_match_the_event_log_after_draining() {
        let session = session_with_script(vec![
            Ok(ProviderEvent::TextDelta {
                content: "a".to_string(),
            }),
            Ok(ProviderEvent::Usage(UsageStats {
                prompt_tokens: 2,
                completion_tokens: 4,
                total_tokens: 6,
            })),
            Ok(ProviderEvent::Finish {
                reason: "stop".to_string(),
            }),
        ])
        .await;

        let frames: Vec<WireFrame> = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::Native,
                ChatOptions::default(),
            )
            .await
            .unwrap()
            .collect()
            .await;

        let log = session.event_log().await;
        let stats = session.stats().await;
        assert_eq!(stats.events_count, log.len());
        assert_eq!(frames.len(), log.len()); // native format: one frame per event
        assert!(stats.duration_seconds >= 0.0);
        assert_eq!(stats.usage.total_tokens, 6);

        // The finish payload counts every event logged before it
        match &log.last().unwrap().payload {
            EventPayload::Finish {
                total_events,
                usage,
                ..
            } => {
                assert_eq!(*total_events, log.len() - 1);
                assert_eq!(usage.total_tokens, 6);
            }
            other => panic!("expected finish, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn part_balance_holds_in_the_event_log() {
        let session = session_with_script(vec![
            Ok(ProviderEvent::ReasoningDelta {
                content: "think".to_string(),
            }),
            Ok(ProviderEvent::TextDelta {
                content: "answer".to_string(),
            }),
            Ok(ProviderEvent::Finish {
                reason: "stop".to_string(),
            }),
        ])
        .await;

        let _frames: Vec<WireFrame> = session
            .stream_chat(
                vec![ChatMessage::user("hi")],
                None,
                None,
                StreamFormat::Native,
                ChatOptions::default(),
            )
            .await
            .unwrap()
            .collect()
            .await;

        let mut open: Vec<String> = Vec::new();
        for event in session.event_log().await {
            match event.kind() {
                StreamEventKind::TextStart | StreamEventKind::ReasoningStart => {
                    open.push(event.part_id().unwrap().to_string());
                }
                StreamEventKind::TextEnd | StreamEventKind::ReasoningEnd => {
                    assert_eq!(open.pop().as_deref(), event.part_id());
                }
                _ => {}
            }
        }
        assert!(open.is_empty());
    }
}
