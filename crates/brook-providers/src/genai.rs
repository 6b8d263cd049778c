//! genai-backed provider adapter
//!
//! Bridges the genai client's chat stream into the provider event
//! vocabulary. genai resolves tool calls before surfacing them, so this
//! adapter emits `ToolCallAvailable` directly; the streaming core
//! synthesizes the start/delta lifecycle for consumers that expect it.

use crate::adapter::{ChatMessage, ChatOptions, ProviderAdapter, ToolSpec};
use crate::event::{ProviderEvent, ProviderEventStream};
use anyhow::anyhow;
use async_trait::async_trait;
use brook_common::{ProviderSettings, ProviderType};
use futures_util::StreamExt;
use genai::Client as GenaiClient;
use genai::chat::{
    ChatMessage as GenaiChatMessage, ChatRequest, ChatStreamEvent, Tool,
};
use tracing::debug;

/// Provider adapter backed by the genai multi-provider client
pub struct GenaiProvider {
    settings: ProviderSettings,
    client: GenaiClient,
}

impl GenaiProvider {
    /// Create an adapter for the model named in `settings`
    pub fn new(settings: ProviderSettings) -> Self {
        let client = GenaiClient::builder()
            .with_chat_options(genai::chat::ChatOptions {
                capture_content: Some(true),
                capture_reasoning_content: Some(true),
                capture_tool_calls: Some(true),
                capture_usage: Some(true),
                ..Default::default()
            })
            .build();

        Self { settings, client }
    }

    fn to_genai_messages(messages: &[ChatMessage]) -> Vec<GenaiChatMessage> {
        messages
            .iter()
            .map(|msg| match msg {
                ChatMessage::System { content } => GenaiChatMessage::system(content),
                ChatMessage::User { content } => GenaiChatMessage::user(content),
                ChatMessage::Assistant { content } => GenaiChatMessage::assistant(content),
                ChatMessage::Tool { content, .. } => {
                    GenaiChatMessage::assistant(format!("Tool result: {}", content))
                }
            })
            .collect()
    }

    fn to_genai_tools(tools: &[ToolSpec]) -> Vec<Tool> {
        tools
            .iter()
            .map(|tool| {
                Tool::new(tool.name.clone())
                    .with_description(tool.description.clone())
                    .with_schema(tool.schema.clone())
            })
            .collect()
    }
}

/// Map one genai stream event into the provider vocabulary.
///
/// `Start` carries no content and is dropped; the streaming core opens
/// parts lazily when the first delta arrives.
fn map_stream_event(event: ChatStreamEvent) -> Option<ProviderEvent> {
    match event {
        ChatStreamEvent::Start => None,
        ChatStreamEvent::Chunk(chunk) => Some(ProviderEvent::TextDelta {
            content: chunk.content,
        }),
        ChatStreamEvent::ReasoningChunk(chunk) => Some(ProviderEvent::ReasoningDelta {
            content: chunk.content,
        }),
        ChatStreamEvent::ToolCallChunk(chunk) => Some(ProviderEvent::ToolCallAvailable {
            tool_call_id: chunk.tool_call.call_id,
            tool_name: chunk.tool_call.fn_name,
            input: chunk.tool_call.fn_arguments,
        }),
        ChatStreamEvent::End(_) => Some(ProviderEvent::Finish {
            reason: "stop".to_string(),
        }),
    }
}

#[async_trait]
impl ProviderAdapter for GenaiProvider {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        options: &ChatOptions,
    ) -> anyhow::Result<ProviderEventStream> {
        debug!(
            "Streaming chat via genai model {} with {} messages",
            self.settings.model_name,
            messages.len()
        );

        let mut chat_req = ChatRequest::new(Self::to_genai_messages(messages));
        if let Some(tools) = tools {
            if !tools.is_empty() {
                chat_req = chat_req.with_tools(Self::to_genai_tools(tools));
            }
        }

        let request_options = genai::chat::ChatOptions {
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            ..Default::default()
        };

        let response = self
            .client
            .exec_chat_stream(&self.settings.model_name, chat_req, Some(&request_options))
            .await
            .map_err(|e| anyhow!("GenAI API error: {}", e))?;

        let stream = response.stream.filter_map(|item| async move {
            match item {
                Ok(event) => map_stream_event(event).map(Ok),
                Err(e) => Some(Err(anyhow!("GenAI stream error: {}", e))),
            }
        });

        Ok(Box::pin(stream))
    }

    fn supports_feature(&self, feature: &str) -> bool {
        match feature {
            "streaming" => self.settings.supports_streaming,
            "tools" => self.settings.supports_tools,
            "vision" => self.settings.supports_vision,
            _ => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.settings.model_name
    }

    fn provider_type(&self) -> ProviderType {
        self.settings.provider_type
    }
}
