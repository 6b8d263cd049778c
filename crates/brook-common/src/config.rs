//! Configuration types and utilities for Brook

use serde::{Deserialize, Serialize};

use crate::types::ProviderType;

/// Base configuration that all components can use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    pub data_dir: String,
    pub log_level: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Settings for a single registered provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider kind (openai, anthropic, ollama, ...)
    pub provider_type: ProviderType,
    /// Model to request from the provider
    pub model_name: String,
    /// API key (optional, can use environment variables)
    pub api_key: Option<String>,
    /// Base URL for API (optional, uses provider default)
    pub base_url: Option<String>,
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Whether the provider can stream responses
    pub supports_streaming: bool,
    /// Whether the provider can call tools
    pub supports_tools: bool,
    /// Whether the provider accepts image input
    pub supports_vision: bool,
    /// Context window size in tokens
    pub max_context_length: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            model_name: "gpt-4".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            timeout_seconds: 60,
            supports_streaming: true,
            supports_tools: true,
            supports_vision: false,
            max_context_length: 8192,
        }
    }
}

/// Tuning knobs for the streaming core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Capacity of the frame channel between a session's drive task and its
    /// consumer
    pub channel_capacity: usize,
    /// Coalescing threshold in characters for the buffered processor
    pub buffer_size: usize,
    /// Flush interval in milliseconds for the buffered processor
    pub flush_interval_ms: u64,
    /// Capacity of each per-stream queue inside the aggregator. Producers
    /// block when the queue is full rather than dropping items.
    pub aggregator_queue_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            buffer_size: 1024,
            flush_interval_ms: 100,
            aggregator_queue_capacity: 256,
        }
    }
}
