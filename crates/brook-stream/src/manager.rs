//! Streaming chat manager
//!
//! Registry of active sessions plus the agent-aware dispatch: agent chat
//! prefers the agent manager's native streaming capability and falls back
//! to the generic multi-provider path on the same session. Sessions are
//! destroyed by explicit removal or by dropping the manager; there is no
//! background TTL sweep.

use crate::format::StreamFormat;
use crate::session::{FrameStream, SessionStats, StreamingChatSession};
use async_trait::async_trait;
use brook_common::{BrookError, StreamingConfig};
use brook_providers::{ChatMessage, ChatOptions, ProviderEventStream, ProviderRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Native streaming capability an agent manager may expose
#[async_trait]
pub trait AgentStreaming: Send + Sync {
    /// Run an agent and stream its execution as provider events
    async fn stream_agent_run(
        &self,
        agent_id: &str,
        message: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> anyhow::Result<ProviderEventStream>;
}

/// The agent manager collaborator. Streaming support is an explicit
/// optional capability: implementations either hand out their
/// `AgentStreaming` interface or they don't, and the manager falls back
/// to the generic provider path.
pub trait AgentManager: Send + Sync {
    /// Display label for the agent, used in metadata frames
    fn agent_label(&self, agent_id: &str) -> String;

    /// The native streaming capability, when implemented
    fn streaming(&self) -> Option<&dyn AgentStreaming> {
        None
    }
}

/// Registry and dispatcher for streaming chat sessions
pub struct StreamingChatManager {
    registry: Arc<ProviderRegistry>,
    agent_manager: Option<Arc<dyn AgentManager>>,
    sessions: RwLock<HashMap<String, Arc<StreamingChatSession>>>,
    config: StreamingConfig,
}

impl StreamingChatManager {
    pub fn new(registry: Arc<ProviderRegistry>, config: StreamingConfig) -> Self {
        Self {
            registry,
            agent_manager: None,
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Attach an agent manager, enabling `stream_chat_with_agent`
    pub fn with_agent_manager(mut self, agent_manager: Arc<dyn AgentManager>) -> Self {
        self.agent_manager = Some(agent_manager);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Create and register a session, generating an id when none is given
    pub async fn create_session(&self, session_id: Option<String>) -> Arc<StreamingChatSession> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = Arc::new(StreamingChatSession::new(
            session_id.clone(),
            Arc::clone(&self.registry),
            self.config.clone(),
        ));
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::clone(&session));
        debug!("Created streaming session: {}", session_id);
        session
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<StreamingChatSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Remove a session. Removing an unknown id is not an error; an
    /// in-flight drive task keeps its own Arc and finishes undisturbed.
    pub async fn remove_session(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn active_sessions_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Read-only stats projection for one session
    pub async fn session_stats(&self, session_id: &str) -> Option<SessionStats> {
        match self.get_session(session_id).await {
            Some(session) => Some(session.stats().await),
            None => None,
        }
    }

    async fn resolve_session(&self, session_id: Option<String>) -> Arc<StreamingChatSession> {
        match session_id {
            Some(id) => match self.get_session(&id).await {
                Some(session) => session,
                None => self.create_session(Some(id)).await,
            },
            None => self.create_session(None).await,
        }
    }

    /// Stream one chat turn through an agent.
    ///
    /// Prefers the agent manager's native streaming capability; otherwise
    /// the message goes through the generic provider path on the same
    /// session. Calling this without a configured agent manager is a
    /// configuration error, raised before any frame is produced.
    pub async fn stream_chat_with_agent(
        &self,
        agent_id: &str,
        message: &str,
        session_id: Option<String>,
        provider_id: Option<String>,
        format: StreamFormat,
        user_id: Option<String>,
        options: ChatOptions,
    ) -> Result<FrameStream, BrookError> {
        let agent_manager = self
            .agent_manager
            .as_ref()
            .ok_or_else(|| BrookError::Config("agent manager not configured".to_string()))?;

        let session = self.resolve_session(session_id).await;

        if let Some(streaming) = agent_manager.streaming() {
            info!(
                "Streaming agent {} natively on session {}",
                agent_id,
                session.session_id()
            );
            let source = streaming
                .stream_agent_run(agent_id, message, session.session_id(), user_id.as_deref())
                .await
                .map_err(|e| BrookError::Provider(e.to_string()))?;

            let metadata = crate::event::SessionMetadata {
                session_id: session.session_id().to_string(),
                provider_id: format!("agent:{}", agent_id),
                model_name: agent_manager.agent_label(agent_id),
                start_time: session.start_time(),
            };
            return Ok(session.stream_events(source, metadata, format));
        }

        debug!(
            "Agent {} has no native streaming, using provider path",
            agent_id
        );
        session
            .stream_chat(
                vec![ChatMessage::user(message)],
                provider_id,
                None,
                format,
                options,
            )
            .await
    }
}
