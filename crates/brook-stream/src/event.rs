//! Canonical streaming events
//!
//! Source-independent representation of one streaming unit. Each event
//! carries a kind-specific payload, the id of the logical part it belongs
//! to where applicable, a timestamp, and a globally unique event id. Two
//! distinct logical parts never share a part id, even when one replaces
//! the other in the same slot.

use brook_common::UsageStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The closed set of canonical event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEventKind {
    TextStart,
    TextDelta,
    TextEnd,
    ReasoningStart,
    ReasoningDelta,
    ReasoningEnd,
    ToolInputStart,
    ToolInputDelta,
    ToolInputAvailable,
    ToolOutputAvailable,
    Error,
    Finish,
    Metadata,
    Usage,
}

impl StreamEventKind {
    /// Wire-level type name shared by every output format
    pub fn wire_name(&self) -> &'static str {
        match self {
            StreamEventKind::TextStart => "text-start",
            StreamEventKind::TextDelta => "text-delta",
            StreamEventKind::TextEnd => "text-end",
            StreamEventKind::ReasoningStart => "reasoning-start",
            StreamEventKind::ReasoningDelta => "reasoning-delta",
            StreamEventKind::ReasoningEnd => "reasoning-end",
            StreamEventKind::ToolInputStart => "tool-input-start",
            StreamEventKind::ToolInputDelta => "tool-input-delta",
            StreamEventKind::ToolInputAvailable => "tool-input-available",
            StreamEventKind::ToolOutputAvailable => "tool-output-available",
            StreamEventKind::Error => "error",
            StreamEventKind::Finish => "finish",
            StreamEventKind::Metadata => "metadata",
            StreamEventKind::Usage => "usage",
        }
    }
}

impl std::fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Session-level metadata announced as the first frame of a chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub provider_id: String,
    pub model_name: String,
    pub start_time: DateTime<Utc>,
}

/// Kind-specific payload, one variant per `StreamEventKind`
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },
    Error {
        message: String,
    },
    Finish {
        total_events: usize,
        duration_seconds: f64,
        usage: UsageStats,
    },
    Metadata(SessionMetadata),
    Usage(UsageStats),
}

/// One canonical streaming event
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
    /// Globally unique id of this event (not the part id)
    pub event_id: String,
}

impl StreamEvent {
    /// Wrap a payload with a fresh event id and the current timestamp
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            event_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn kind(&self) -> StreamEventKind {
        match &self.payload {
            EventPayload::TextStart { .. } => StreamEventKind::TextStart,
            EventPayload::TextDelta { .. } => StreamEventKind::TextDelta,
            EventPayload::TextEnd { .. } => StreamEventKind::TextEnd,
            EventPayload::ReasoningStart { .. } => StreamEventKind::ReasoningStart,
            EventPayload::ReasoningDelta { .. } => StreamEventKind::ReasoningDelta,
            EventPayload::ReasoningEnd { .. } => StreamEventKind::ReasoningEnd,
            EventPayload::ToolInputStart { .. } => StreamEventKind::ToolInputStart,
            EventPayload::ToolInputDelta { .. } => StreamEventKind::ToolInputDelta,
            EventPayload::ToolInputAvailable { .. } => StreamEventKind::ToolInputAvailable,
            EventPayload::ToolOutputAvailable { .. } => StreamEventKind::ToolOutputAvailable,
            EventPayload::Error { .. } => StreamEventKind::Error,
            EventPayload::Finish { .. } => StreamEventKind::Finish,
            EventPayload::Metadata(_) => StreamEventKind::Metadata,
            EventPayload::Usage(_) => StreamEventKind::Usage,
        }
    }

    /// The id of the logical part (or tool call) this event belongs to
    pub fn part_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::TextStart { id }
            | EventPayload::TextDelta { id, .. }
            | EventPayload::TextEnd { id }
            | EventPayload::ReasoningStart { id }
            | EventPayload::ReasoningDelta { id, .. }
            | EventPayload::ReasoningEnd { id } => Some(id),
            EventPayload::ToolInputStart { tool_call_id, .. }
            | EventPayload::ToolInputDelta { tool_call_id, .. }
            | EventPayload::ToolInputAvailable { tool_call_id, .. }
            | EventPayload::ToolOutputAvailable { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}
