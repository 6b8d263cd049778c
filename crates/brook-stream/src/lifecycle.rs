//! Part lifecycle tracking
//!
//! Provider output is a single sequential cursor: at most one text or
//! reasoning part is open at a time, and switching kinds forces the old
//! part closed before the new one opens. Tool calls are tracked
//! independently and many may be open concurrently.

use crate::event::{EventPayload, StreamEvent};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Kind of content the single cursor can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Reasoning,
}

/// The currently open text/reasoning part
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePart {
    pub kind: PartKind,
    pub id: String,
}

fn fresh_part_id(kind: PartKind) -> String {
    match kind {
        PartKind::Text => format!("msg_{}", Uuid::new_v4().simple()),
        PartKind::Reasoning => format!("reasoning_{}", Uuid::new_v4().simple()),
    }
}

fn start_event(kind: PartKind, id: String) -> StreamEvent {
    match kind {
        PartKind::Text => StreamEvent::new(EventPayload::TextStart { id }),
        PartKind::Reasoning => StreamEvent::new(EventPayload::ReasoningStart { id }),
    }
}

fn end_event(kind: PartKind, id: String) -> StreamEvent {
    match kind {
        PartKind::Text => StreamEvent::new(EventPayload::TextEnd { id }),
        PartKind::Reasoning => StreamEvent::new(EventPayload::ReasoningEnd { id }),
    }
}

/// Tracks the single text/reasoning cursor
#[derive(Debug, Default)]
pub struct PartTracker {
    active: Option<ActivePart>,
}

impl PartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ActivePart> {
        self.active.as_ref()
    }

    /// Make sure a part of `kind` is open, synthesizing End(old) and
    /// Start(new) as needed. Returns the events to emit before the delta
    /// and the id of the now-open part. Every new part gets a fresh id;
    /// ids are never reused.
    pub fn ensure_open(&mut self, kind: PartKind) -> (Vec<StreamEvent>, String) {
        if let Some(active) = &self.active {
            if active.kind == kind {
                return (Vec::new(), active.id.clone());
            }
        }

        let mut events = Vec::new();
        if let Some(old) = self.active.take() {
            events.push(end_event(old.kind, old.id));
        }

        let id = fresh_part_id(kind);
        events.push(start_event(kind, id.clone()));
        self.active = Some(ActivePart {
            kind,
            id: id.clone(),
        });
        (events, id)
    }

    /// Close the open part, if any. Used when a tool call interrupts
    /// prose and on every terminal path.
    pub fn interrupt(&mut self) -> Option<StreamEvent> {
        self.active
            .take()
            .map(|part| end_event(part.kind, part.id))
    }
}

/// State kept per tool call
#[derive(Debug, Clone)]
pub struct ToolCallState {
    pub started: bool,
    pub name: Option<String>,
    pub accumulated_args: String,
}

/// Tracks concurrently open tool calls.
///
/// An entry is created on first sight of a delta/available event for an
/// id and never evicted until the run ends, so reordered provider
/// callbacks cannot trigger a duplicate start.
#[derive(Debug, Default)]
pub struct ToolCallTracker {
    calls: HashMap<String, ToolCallState>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arguments fragment. The first sight of an id yields a
    /// ToolInputStart before the delta.
    pub fn observe_delta(
        &mut self,
        tool_call_id: &str,
        tool_name: Option<&str>,
        fragment: &str,
    ) -> Vec<StreamEvent> {
        let entry = self
            .calls
            .entry(tool_call_id.to_string())
            .or_insert_with(|| ToolCallState {
                started: false,
                name: None,
                accumulated_args: String::new(),
            });
        if entry.name.is_none() {
            entry.name = tool_name.map(|name| name.to_string());
        }

        let mut events = Vec::new();
        if !entry.started {
            entry.started = true;
            events.push(StreamEvent::new(EventPayload::ToolInputStart {
                tool_call_id: tool_call_id.to_string(),
                tool_name: entry.name.clone().unwrap_or_default(),
            }));
        }

        entry.accumulated_args.push_str(fragment);
        events.push(StreamEvent::new(EventPayload::ToolInputDelta {
            tool_call_id: tool_call_id.to_string(),
            input_text_delta: fragment.to_string(),
        }));
        events
    }

    /// Record a fully resolved tool call. Ids never seen before get a
    /// synthesized start (and one delta carrying the serialized input)
    /// so consumers always observe the full lifecycle; ids already
    /// started never re-emit the start. Available fires either way.
    pub fn observe_available(
        &mut self,
        tool_call_id: &str,
        tool_name: &str,
        input: &Value,
    ) -> Vec<StreamEvent> {
        let entry = self
            .calls
            .entry(tool_call_id.to_string())
            .or_insert_with(|| ToolCallState {
                started: false,
                name: None,
                accumulated_args: String::new(),
            });
        entry.name = Some(tool_name.to_string());

        let mut events = Vec::new();
        if !entry.started {
            entry.started = true;
            events.push(StreamEvent::new(EventPayload::ToolInputStart {
                tool_call_id: tool_call_id.to_string(),
                tool_name: tool_name.to_string(),
            }));
            if !input.is_null() {
                let serialized = input.to_string();
                entry.accumulated_args.push_str(&serialized);
                events.push(StreamEvent::new(EventPayload::ToolInputDelta {
                    tool_call_id: tool_call_id.to_string(),
                    input_text_delta: serialized,
                }));
            }
        }

        events.push(StreamEvent::new(EventPayload::ToolInputAvailable {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            input: input.clone(),
        }));
        events
    }

    pub fn get(&self, tool_call_id: &str) -> Option<&ToolCallState> {
        self.calls.get(tool_call_id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
