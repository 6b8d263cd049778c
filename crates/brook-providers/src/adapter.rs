//! The adapter trait concrete providers implement
//!
//! Adapters own the network protocol; the rest of Brook only sees
//! `ProviderEvent`s. Retry policy, if any, belongs here — the streaming
//! core converts a mid-stream failure into a single terminal error frame
//! and never retries.

use crate::event::ProviderEventStream;
use async_trait::async_trait;
use brook_common::ProviderType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Internal representation of a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    Tool {
        tool_name: String,
        content: String,
        call_id: Option<String>,
    },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }
}

/// Declarative description of a tool offered to the model.
///
/// Execution happens outside Brook; results re-enter the stream as
/// `ProviderEvent::ToolResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name the model uses to call the tool
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// JSON schema of the tool's parameters
    pub schema: Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}

/// Per-request overrides forwarded to the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Result of an adapter health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub provider: String,
    pub model: String,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A provider of streaming chat completions
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Start a streaming chat turn and return its event source
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        options: &ChatOptions,
    ) -> anyhow::Result<ProviderEventStream>;

    /// Check whether the adapter supports a named capability
    /// ("streaming", "tools", "vision")
    fn supports_feature(&self, feature: &str) -> bool;

    /// Model identifier used for metadata frames
    fn model_name(&self) -> &str;

    /// Provider kind, for listings and logs
    fn provider_type(&self) -> ProviderType;

    /// Probe the adapter. The default reports healthy without a network
    /// round-trip; adapters backed by remote APIs should override this.
    async fn health_check(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            provider: self.provider_type().to_string(),
            model: self.model_name().to_string(),
            error: None,
            timestamp: Utc::now(),
        }
    }
}
