//! Provider administration endpoints

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use brook_common::{ProviderSettings, ProviderType};
use brook_providers::GenaiProvider;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ProviderRegistrationRequest {
    pub provider_id: String,
    pub provider_type: ProviderType,
    pub model_name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_seconds: Option<u64>,
}

/// List the registered providers
pub async fn list_providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let providers = state.manager.registry().list().await;
    let total_count = providers.len();
    Json(json!({
        "providers": providers,
        "total_count": total_count,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Register a new provider adapter
pub async fn register_provider(
    State(state): State<AppState>,
    Json(request): Json<ProviderRegistrationRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let defaults = ProviderSettings::default();
    let settings = ProviderSettings {
        provider_type: request.provider_type,
        model_name: request.model_name,
        api_key: request.api_key,
        base_url: request.base_url,
        max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: request.temperature.unwrap_or(defaults.temperature),
        timeout_seconds: request.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        ..defaults
    };

    state
        .manager
        .registry()
        .register(
            request.provider_id.clone(),
            Arc::new(GenaiProvider::new(settings)),
        )
        .await;
    info!("Registered provider {} via API", request.provider_id);

    Ok(Json(json!({
        "message": "Provider registered successfully",
        "provider_id": request.provider_id,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Health status of every registered provider
pub async fn providers_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.manager.registry().health_check_all().await;
    let healthy = health
        .values()
        .filter(|report| report.status == "healthy")
        .count();
    let total = health.len();

    Json(json!({
        "health_status": health,
        "total_providers": total,
        "healthy_providers": healthy,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
