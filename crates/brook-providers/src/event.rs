//! Provider-native streaming events
//!
//! Every provider adapter, whatever its wire protocol looks like, reduces
//! its output to this vocabulary. The streaming core consumes it as an
//! opaque async source and enforces the part-lifecycle invariants on top.

use brook_common::UsageStats;
use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;

/// One unit of provider output, before canonicalization.
///
/// Tool arguments may arrive as partial JSON fragments (`ToolCallDelta`),
/// as a fully resolved value (`ToolCallAvailable`), or both for the same
/// `tool_call_id`; providers that skip deltas are legal.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A fragment of assistant prose
    TextDelta { content: String },
    /// A fragment of reasoning/thinking output
    ReasoningDelta { content: String },
    /// A fragment of a tool call's JSON arguments; the name is usually only
    /// present on the first fragment
    ToolCallDelta {
        tool_call_id: String,
        tool_name: Option<String>,
        args_fragment: String,
    },
    /// A tool call whose arguments are fully resolved
    ToolCallAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    /// The result of executing a tool call
    ToolResult { tool_call_id: String, output: Value },
    /// Token accounting reported by the provider
    Usage(UsageStats),
    /// Terminal marker for a successful run
    Finish { reason: String },
}

/// The async event source a provider adapter hands to the streaming core.
pub type ProviderEventStream =
    Pin<Box<dyn Stream<Item = Result<ProviderEvent, anyhow::Error>> + Send>>;
