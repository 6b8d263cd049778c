//! Provider registry with capability-based selection
//!
//! Keeps the set of registered adapters, elects a default, and answers
//! "which provider can stream and call tools right now". Registration and
//! removal can race background producers that look providers up, so the
//! maps live behind an async lock.

use crate::adapter::{HealthReport, ProviderAdapter};
use brook_common::{BrookError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Listing entry for one registered provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub provider_id: String,
    pub provider_type: String,
    pub model_name: String,
    pub supports_streaming: bool,
    pub supports_tools: bool,
    pub supports_vision: bool,
    pub is_default: bool,
}

/// Registry of provider adapters
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
    default_provider: RwLock<Option<String>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `provider_id`. The first registration
    /// becomes the default.
    pub async fn register(&self, provider_id: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        let provider_id = provider_id.into();
        self.adapters
            .write()
            .await
            .insert(provider_id.clone(), adapter);

        let mut default = self.default_provider.write().await;
        if default.is_none() {
            *default = Some(provider_id.clone());
        }
        info!("Registered provider: {}", provider_id);
    }

    /// Look up an adapter, falling back to the default when no id is given
    pub async fn get(&self, provider_id: Option<&str>) -> Result<Arc<dyn ProviderAdapter>> {
        let resolved = match provider_id {
            Some(id) => id.to_string(),
            None => self
                .default_provider
                .read()
                .await
                .clone()
                .ok_or_else(|| BrookError::Config("no providers registered".to_string()))?,
        };

        self.adapters
            .read()
            .await
            .get(&resolved)
            .cloned()
            .ok_or_else(|| BrookError::Provider(format!("provider not found: {}", resolved)))
    }

    /// Pick the first registered provider supporting every required
    /// feature, falling back to the default when nothing matches.
    pub async fn best_provider_for(&self, required_features: &[&str]) -> Result<String> {
        let adapters = self.adapters.read().await;
        if adapters.is_empty() {
            return Err(BrookError::Config("no providers registered".to_string()));
        }

        for (provider_id, adapter) in adapters.iter() {
            if required_features
                .iter()
                .all(|feature| adapter.supports_feature(feature))
            {
                return Ok(provider_id.clone());
            }
        }

        warn!(
            "No provider supports {:?}, falling back to default",
            required_features
        );
        self.default_provider
            .read()
            .await
            .clone()
            .ok_or_else(|| BrookError::Config("no default provider".to_string()))
    }

    /// Make `provider_id` the default. Returns false if it is not registered.
    pub async fn set_default(&self, provider_id: &str) -> bool {
        if self.adapters.read().await.contains_key(provider_id) {
            *self.default_provider.write().await = Some(provider_id.to_string());
            true
        } else {
            false
        }
    }

    /// Remove a provider, re-electing a default if the removed one held it.
    /// Removing an unknown id is not an error.
    pub async fn remove(&self, provider_id: &str) -> bool {
        let mut adapters = self.adapters.write().await;
        if adapters.remove(provider_id).is_none() {
            return false;
        }

        let mut default = self.default_provider.write().await;
        if default.as_deref() == Some(provider_id) {
            *default = adapters.keys().next().cloned();
        }
        true
    }

    /// Snapshot of the registered providers
    pub async fn list(&self) -> Vec<ProviderInfo> {
        let adapters = self.adapters.read().await;
        let default = self.default_provider.read().await.clone();

        adapters
            .iter()
            .map(|(provider_id, adapter)| ProviderInfo {
                provider_id: provider_id.clone(),
                provider_type: adapter.provider_type().to_string(),
                model_name: adapter.model_name().to_string(),
                supports_streaming: adapter.supports_feature("streaming"),
                supports_tools: adapter.supports_feature("tools"),
                supports_vision: adapter.supports_feature("vision"),
                is_default: default.as_deref() == Some(provider_id.as_str()),
            })
            .collect()
    }

    /// Probe every registered adapter
    pub async fn health_check_all(&self) -> HashMap<String, HealthReport> {
        let adapters: Vec<(String, Arc<dyn ProviderAdapter>)> = self
            .adapters
            .read()
            .await
            .iter()
            .map(|(id, adapter)| (id.clone(), Arc::clone(adapter)))
            .collect();

        let mut results = HashMap::new();
        for (provider_id, adapter) in adapters {
            results.insert(provider_id, adapter.health_check().await);
        }
        results
    }

    pub async fn len(&self) -> usize {
        self.adapters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.adapters.read().await.is_empty()
    }
}
