//! Brook API server
//!
//! HTTP/WebSocket surface for the streaming chat core: SSE chat
//! endpoints, agent chat, multi-stream aggregation, provider
//! administration and session statistics.

use std::sync::Arc;

use anyhow::Result;
use brook_common::{ProviderSettings, ProviderType, StreamingConfig};
use brook_providers::{GenaiProvider, ProviderRegistry};
use brook_stream::StreamingChatManager;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;

/// Command-line arguments for the Brook API server
#[derive(Parser, Debug)]
#[clap(name = "brook-api", about = "Streaming chat API server for Brook")]
struct Args {
    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Model to register as the default provider
    #[clap(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Provider id for the default provider
    #[clap(long, default_value = "default")]
    provider_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let args = Args::parse();

    // Setup tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Brook API server...");
    info!("Default model: {}", args.model);

    // Register the default genai-backed provider
    let registry = Arc::new(ProviderRegistry::new());
    let settings = ProviderSettings {
        provider_type: ProviderType::OpenAI,
        model_name: args.model.clone(),
        ..Default::default()
    };
    registry
        .register(args.provider_id.clone(), Arc::new(GenaiProvider::new(settings)))
        .await;

    // One shared manager, wired in at the top level
    let manager = Arc::new(StreamingChatManager::new(
        registry,
        StreamingConfig::default(),
    ));

    let app = api::create_router(api::AppState::new(manager));

    let addr = format!("{}:{}", args.host, args.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
