//! Wire-format serialization
//!
//! Pure rendering of canonical events into the supported output formats.
//! The same event and format always produce byte-identical output; no
//! rendering path mutates state or fails. Event kinds without a bespoke
//! AI SDK v5 shape fall back to the generic SSE rendering.

use crate::event::{EventPayload, StreamEvent, StreamEventKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Transport-level terminal marker for the SSE-family formats, distinct
/// from the protocol-level finish event.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Requested output format for a frame sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamFormat {
    /// Server-Sent Events text protocol
    #[serde(rename = "sse")]
    Sse,
    /// JSON envelopes for WebSocket delivery (no DONE sentinel; closing
    /// the connection signals end)
    #[serde(rename = "websocket")]
    WebSocket,
    /// Vercel AI SDK v5 UI Message Stream
    #[serde(rename = "ai_sdk_v5")]
    AiSdkV5,
    /// Unserialized events for in-process consumption
    #[serde(rename = "generator")]
    Native,
}

impl StreamFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            StreamFormat::Sse | StreamFormat::AiSdkV5 => "text/event-stream",
            StreamFormat::WebSocket | StreamFormat::Native => "application/json",
        }
    }

    /// Whether the format terminates with the literal DONE frame
    pub fn uses_done_sentinel(&self) -> bool {
        matches!(self, StreamFormat::Sse | StreamFormat::AiSdkV5)
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        StreamFormat::Sse
    }
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFormat::Sse => write!(f, "sse"),
            StreamFormat::WebSocket => write!(f, "websocket"),
            StreamFormat::AiSdkV5 => write!(f, "ai_sdk_v5"),
            StreamFormat::Native => write!(f, "generator"),
        }
    }
}

/// One serialized unit of the wire protocol
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    /// An SSE `data:` block (SSE and AI SDK v5 formats)
    Text(String),
    /// A WebSocket JSON envelope
    Json(Value),
    /// The unserialized event (native format)
    Event(StreamEvent),
}

impl WireFrame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireFrame::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            WireFrame::Json(value) => Some(value),
            _ => None,
        }
    }
}

fn sse_block(value: &Value) -> String {
    format!("data: {}\n\n", value)
}

impl StreamEvent {
    /// Kind-specific fields, flattened for the generic renderings. The
    /// logical part id is exposed as `part_id` so it cannot collide with
    /// the envelope's event id.
    fn payload_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        match &self.payload {
            EventPayload::TextStart { id }
            | EventPayload::TextEnd { id }
            | EventPayload::ReasoningStart { id }
            | EventPayload::ReasoningEnd { id } => {
                fields.insert("part_id".to_string(), json!(id));
            }
            EventPayload::TextDelta { id, delta } | EventPayload::ReasoningDelta { id, delta } => {
                fields.insert("part_id".to_string(), json!(id));
                fields.insert("delta".to_string(), json!(delta));
            }
            EventPayload::ToolInputStart {
                tool_call_id,
                tool_name,
            } => {
                fields.insert("tool_call_id".to_string(), json!(tool_call_id));
                fields.insert("tool_name".to_string(), json!(tool_name));
            }
            EventPayload::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => {
                fields.insert("tool_call_id".to_string(), json!(tool_call_id));
                fields.insert("input_text_delta".to_string(), json!(input_text_delta));
            }
            EventPayload::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                fields.insert("tool_call_id".to_string(), json!(tool_call_id));
                fields.insert("tool_name".to_string(), json!(tool_name));
                fields.insert("input".to_string(), input.clone());
            }
            EventPayload::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                fields.insert("tool_call_id".to_string(), json!(tool_call_id));
                fields.insert("output".to_string(), output.clone());
            }
            EventPayload::Error { message } => {
                fields.insert("error".to_string(), json!(message));
            }
            EventPayload::Finish {
                total_events,
                duration_seconds,
                usage,
            } => {
                fields.insert("total_events".to_string(), json!(total_events));
                fields.insert("duration_seconds".to_string(), json!(duration_seconds));
                fields.insert("usage".to_string(), json!(usage));
            }
            EventPayload::Metadata(metadata) => {
                fields.insert("session_id".to_string(), json!(metadata.session_id));
                fields.insert("provider_id".to_string(), json!(metadata.provider_id));
                fields.insert("model_name".to_string(), json!(metadata.model_name));
                fields.insert(
                    "start_time".to_string(),
                    json!(metadata.start_time.to_rfc3339()),
                );
            }
            EventPayload::Usage(usage) => {
                fields.insert("usage".to_string(), json!(usage));
            }
        }
        fields
    }

    /// Generic SSE rendering: `data: {type,id,timestamp,...fields}\n\n`
    pub fn to_sse_frame(&self) -> String {
        let mut body = Map::new();
        body.insert("type".to_string(), json!(self.kind().wire_name()));
        body.insert("id".to_string(), json!(self.event_id));
        body.insert("timestamp".to_string(), json!(self.timestamp.to_rfc3339()));
        body.extend(self.payload_fields());
        sse_block(&Value::Object(body))
    }

    /// WebSocket envelope: `{type,id,timestamp,data:{...fields}}`
    pub fn to_websocket_envelope(&self) -> Value {
        json!({
            "type": self.kind().wire_name(),
            "id": self.event_id,
            "timestamp": self.timestamp.to_rfc3339(),
            "data": Value::Object(self.payload_fields()),
        })
    }

    /// Compact AI SDK v5 shape. Here `id` is the logical part id — that
    /// is what the UI protocol keys its message parts on.
    pub fn to_ai_sdk_v5_frame(&self) -> String {
        let body = match &self.payload {
            EventPayload::TextStart { id } => json!({"type": "text-start", "id": id}),
            EventPayload::TextDelta { id, delta } => {
                json!({"type": "text-delta", "id": id, "delta": delta})
            }
            EventPayload::TextEnd { id } => json!({"type": "text-end", "id": id}),
            EventPayload::ReasoningStart { id } => {
                json!({"type": "reasoning-start", "id": id})
            }
            EventPayload::ReasoningDelta { id, delta } => {
                json!({"type": "reasoning-delta", "id": id, "delta": delta})
            }
            EventPayload::ReasoningEnd { id } => json!({"type": "reasoning-end", "id": id}),
            EventPayload::ToolInputStart {
                tool_call_id,
                tool_name,
            } => {
                json!({
                    "type": "tool-input-start",
                    "toolCallId": tool_call_id,
                    "toolName": tool_name,
                })
            }
            EventPayload::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => {
                json!({
                    "type": "tool-input-delta",
                    "toolCallId": tool_call_id,
                    "inputTextDelta": input_text_delta,
                })
            }
            EventPayload::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                json!({
                    "type": "tool-input-available",
                    "toolCallId": tool_call_id,
                    "toolName": tool_name,
                    "input": input,
                })
            }
            EventPayload::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                json!({
                    "type": "tool-output-available",
                    "toolCallId": tool_call_id,
                    "output": output,
                })
            }
            EventPayload::Finish { .. } => json!({"type": "finish"}),
            EventPayload::Error { message } => {
                json!({"type": "error", "errorText": message})
            }
            // No bespoke shape in the UI protocol; use the generic rendering
            EventPayload::Metadata(_) | EventPayload::Usage(_) => {
                return self.to_sse_frame();
            }
        };
        sse_block(&body)
    }

    /// Render this event in the requested format
    pub fn render(&self, format: StreamFormat) -> WireFrame {
        match format {
            StreamFormat::Sse => WireFrame::Text(self.to_sse_frame()),
            StreamFormat::AiSdkV5 => WireFrame::Text(self.to_ai_sdk_v5_frame()),
            StreamFormat::WebSocket => WireFrame::Json(self.to_websocket_envelope()),
            StreamFormat::Native => WireFrame::Event(self.clone()),
        }
    }
}
