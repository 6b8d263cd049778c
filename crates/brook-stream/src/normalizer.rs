//! Provider event normalization
//!
//! Expands each provider-native event into the canonical events that keep
//! the part lifecycle well-formed: parts open lazily on the first delta,
//! a tool-call intent always interrupts prose, and the terminal paths
//! close whatever is still open. The normalizer is synchronous and holds
//! no channels; the session drives it over the provider's async source.

use crate::event::{EventPayload, StreamEvent};
use crate::lifecycle::{PartKind, PartTracker, ToolCallTracker};
use brook_providers::ProviderEvent;

/// Maps provider events into canonical stream events
#[derive(Debug, Default)]
pub struct EventNormalizer {
    parts: PartTracker,
    tool_calls: ToolCallTracker,
    finish_reason: Option<String>,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand one provider event. The returned events must be emitted in
    /// order; they include any synthesized End/Start frames the lifecycle
    /// requires.
    pub fn normalize(&mut self, event: ProviderEvent) -> Vec<StreamEvent> {
        match event {
            ProviderEvent::TextDelta { content } => {
                let (mut events, id) = self.parts.ensure_open(PartKind::Text);
                events.push(StreamEvent::new(EventPayload::TextDelta {
                    id,
                    delta: content,
                }));
                events
            }
            ProviderEvent::ReasoningDelta { content } => {
                let (mut events, id) = self.parts.ensure_open(PartKind::Reasoning);
                events.push(StreamEvent::new(EventPayload::ReasoningDelta {
                    id,
                    delta: content,
                }));
                events
            }
            ProviderEvent::ToolCallDelta {
                tool_call_id,
                tool_name,
                args_fragment,
            } => {
                let mut events: Vec<StreamEvent> = self.parts.interrupt().into_iter().collect();
                events.extend(self.tool_calls.observe_delta(
                    &tool_call_id,
                    tool_name.as_deref(),
                    &args_fragment,
                ));
                events
            }
            ProviderEvent::ToolCallAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                let mut events: Vec<StreamEvent> = self.parts.interrupt().into_iter().collect();
                events.extend(
                    self.tool_calls
                        .observe_available(&tool_call_id, &tool_name, &input),
                );
                events
            }
            ProviderEvent::ToolResult {
                tool_call_id,
                output,
            } => {
                vec![StreamEvent::new(EventPayload::ToolOutputAvailable {
                    tool_call_id,
                    output,
                })]
            }
            ProviderEvent::Usage(usage) => {
                vec![StreamEvent::new(EventPayload::Usage(usage))]
            }
            ProviderEvent::Finish { reason } => {
                // The terminal marker closes the cursor; the session owns
                // the protocol-level finish frame.
                self.finish_reason = Some(reason);
                self.parts.interrupt().into_iter().collect()
            }
        }
    }

    /// Close a still-open part at normal run completion
    pub fn close(&mut self) -> Vec<StreamEvent> {
        self.parts.interrupt().into_iter().collect()
    }

    /// Terminal failure: close the open part, then emit the single error
    /// event that ends the sequence.
    pub fn fail(&mut self, message: &str) -> Vec<StreamEvent> {
        let mut events: Vec<StreamEvent> = self.parts.interrupt().into_iter().collect();
        events.push(StreamEvent::new(EventPayload::Error {
            message: message.to_string(),
        }));
        events
    }

    /// Finish reason reported by the provider's terminal marker, if any
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Number of tool calls observed during this run
    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StreamEventKind;
    use serde_json::json;

    fn normalize_all(events: Vec<ProviderEvent>) -> (EventNormalizer, Vec<StreamEvent>) {
        let mut normalizer = EventNormalizer::new();
        let mut out = Vec::new();
        for event in events {
            out.extend(normalizer.normalize(event));
        }
        (normalizer, out)
    }

    fn kinds(events: &[StreamEvent]) -> Vec<StreamEventKind> {
        events.iter().map(|event| event.kind()).collect()
    }

    #[test]
    fn text_then_tool_call_follows_the_canonical_order() {
        // Mirrors a provider that streams prose, a tool call with split
        // arguments, its resolution, and the tool result.
        let (mut normalizer, mut out) = normalize_all(vec![
            ProviderEvent::TextDelta {
                content: "Hel".to_string(),
            },
            ProviderEvent::TextDelta {
                content: "lo".to_string(),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: Some("search".to_string()),
                args_fragment: "{\"q\":".to_string(),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: None,
                args_fragment: "\"x\"}".to_string(),
            },
            ProviderEvent::ToolCallAvailable {
                tool_call_id: "t1".to_string(),
                tool_name: "search".to_string(),
                input: json!({"q": "x"}),
            },
            ProviderEvent::ToolResult {
                tool_call_id: "t1".to_string(),
                output: json!("ok"),
            },
            ProviderEvent::Finish {
                reason: "stop".to_string(),
            },
        ]);
        out.extend(normalizer.close());

        assert_eq!(
            kinds(&out),
            vec![
                StreamEventKind::TextStart,
                StreamEventKind::TextDelta,
                StreamEventKind::TextDelta,
                StreamEventKind::TextEnd,
                StreamEventKind::ToolInputStart,
                StreamEventKind::ToolInputDelta,
                StreamEventKind::ToolInputDelta,
                StreamEventKind::ToolInputAvailable,
                StreamEventKind::ToolOutputAvailable,
            ]
        );
        assert_eq!(normalizer.finish_reason(), Some("stop"));
    }

    #[test]
    fn switching_text_to_reasoning_closes_the_text_part() {
        let (_, out) = normalize_all(vec![
            ProviderEvent::TextDelta {
                content: "a".to_string(),
            },
            ProviderEvent::ReasoningDelta {
                content: "thinking".to_string(),
            },
            ProviderEvent::TextDelta {
                content: "b".to_string(),
            },
        ]);

        assert_eq!(
            kinds(&out),
            vec![
                StreamEventKind::TextStart,
                StreamEventKind::TextDelta,
                StreamEventKind::TextEnd,
                StreamEventKind::ReasoningStart,
                StreamEventKind::ReasoningDelta,
                StreamEventKind::ReasoningEnd,
                StreamEventKind::TextStart,
                StreamEventKind::TextDelta,
            ]
        );

        // The two text parts are distinct
        let first_text = out[0].part_id().unwrap();
        let second_text = out[6].part_id().unwrap();
        assert_ne!(first_text, second_text);
    }

    #[test]
    fn every_start_has_exactly_one_matching_end() {
        let (mut normalizer, mut out) = normalize_all(vec![
            ProviderEvent::ReasoningDelta {
                content: "r".to_string(),
            },
            ProviderEvent::TextDelta {
                content: "t".to_string(),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: Some("calc".to_string()),
                args_fragment: "{}".to_string(),
            },
            ProviderEvent::TextDelta {
                content: "more".to_string(),
            },
        ]);
        out.extend(normalizer.close());

        let mut open: Vec<&str> = Vec::new();
        for event in &out {
            match event.kind() {
                StreamEventKind::TextStart | StreamEventKind::ReasoningStart => {
                    open.push(event.part_id().unwrap());
                }
                StreamEventKind::TextEnd | StreamEventKind::ReasoningEnd => {
                    let started = open.pop().expect("end without start");
                    assert_eq!(started, event.part_id().unwrap());
                }
                _ => {}
            }
        }
        assert!(open.is_empty(), "unclosed parts: {:?}", open);
    }

    #[test]
    fn failure_closes_the_open_part_before_the_error() {
        let mut normalizer = EventNormalizer::new();
        let mut out = Vec::new();
        out.extend(normalizer.normalize(ProviderEvent::TextDelta {
            content: "par".to_string(),
        }));
        out.extend(normalizer.normalize(ProviderEvent::TextDelta {
            content: "tial".to_string(),
        }));
        out.extend(normalizer.fail("connection reset"));

        assert_eq!(
            kinds(&out),
            vec![
                StreamEventKind::TextStart,
                StreamEventKind::TextDelta,
                StreamEventKind::TextDelta,
                StreamEventKind::TextEnd,
                StreamEventKind::Error,
            ]
        );
    }

    #[test]
    fn duplicate_tool_start_is_impossible_across_paths() {
        let (_, out) = normalize_all(vec![
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: Some("search".to_string()),
                args_fragment: "{".to_string(),
            },
            ProviderEvent::ToolCallAvailable {
                tool_call_id: "t1".to_string(),
                tool_name: "search".to_string(),
                input: json!({}),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: None,
                args_fragment: "}".to_string(),
            },
        ]);

        let starts = out
            .iter()
            .filter(|event| event.kind() == StreamEventKind::ToolInputStart)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn concurrent_tool_calls_are_tracked_independently() {
        let (normalizer, out) = normalize_all(vec![
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: Some("a".to_string()),
                args_fragment: "1".to_string(),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t2".to_string(),
                tool_name: Some("b".to_string()),
                args_fragment: "2".to_string(),
            },
            ProviderEvent::ToolCallDelta {
                tool_call_id: "t1".to_string(),
                tool_name: None,
                args_fragment: "3".to_string(),
            },
        ]);

        let starts: Vec<&str> = out
            .iter()
            .filter(|event| event.kind() == StreamEventKind::ToolInputStart)
            .map(|event| event.part_id().unwrap())
            .collect();
        assert_eq!(starts, vec!["t1", "t2"]);
        assert_eq!(normalizer.tool_call_count(), 2);
    }

    #[test]
    fn usage_passes_through_unchanged() {
        let usage = brook_common::UsageStats {
            prompt_tokens: 3,
            completion_tokens: 7,
            total_tokens: 10,
        };
        let (_, out) = normalize_all(vec![ProviderEvent::Usage(usage.clone())]);
        assert_eq!(kinds(&out), vec![StreamEventKind::Usage]);
        assert_eq!(out[0].payload, EventPayload::Usage(usage));
    }
}
