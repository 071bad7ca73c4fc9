//! Operations exposed to the transport layer

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::dispatcher::{DispatchRequest, DispatchSettings, Dispatcher};
use super::routing::{CapabilityRouter, RoutingPolicy};
use crate::adapters::metrics_handler::MetricsCollector;
use crate::agents::AgentRegistry;
use crate::config::Settings;
use crate::domain::{
    AgentDescriptor, Attachment, ChatHistory, DispatchResult, HealthState, Message, SessionSummary,
};
use crate::error::OrchestratorResult;
use crate::session::{InMemorySessionStore, SessionStore};

/// Default number of messages in a history page
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;

/// Tail of a session's history with its bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_messages: usize,
}

impl HistoryPage {
    fn from_history(history: &ChatHistory, page_size: usize) -> Self {
        Self {
            session_id: history.session_id.clone(),
            user_id: history.user_id.clone(),
            messages: history.recent(page_size).to_vec(),
            created_at: history.created_at,
            last_updated: history.last_updated,
            total_messages: history.message_count(),
        }
    }
}

/// Entry point for everything the HTTP layer does
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    sessions: Arc<dyn SessionStore>,
    dispatcher: Dispatcher,
    history_page_size: usize,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        sessions: Arc<dyn SessionStore>,
        router: Arc<dyn RoutingPolicy>,
        settings: DispatchSettings,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone(), sessions.clone(), router, settings);
        Self {
            registry,
            sessions,
            dispatcher,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    /// Orchestrator with an in-memory store, the capability router and
    /// default tunables
    pub fn in_memory(registry: Arc<AgentRegistry>) -> Self {
        Self::new(
            registry,
            Arc::new(InMemorySessionStore::default()),
            Arc::new(CapabilityRouter::default()),
            DispatchSettings::default(),
        )
    }

    /// Build the registry and stores described by `settings`
    pub async fn from_settings(settings: &Settings, metrics: Option<Arc<MetricsCollector>>) -> Self {
        let mut registry = AgentRegistry::new(settings.health.probe_timeout());
        if let Some(metrics) = &metrics {
            registry = registry.with_metrics(metrics.clone());
        }
        let registry = Arc::new(registry);

        for agent in settings.enabled_agents() {
            registry
                .register_with_timeout(agent.descriptor(), agent.build_client(), agent.timeout())
                .await;
        }

        let router = CapabilityRouter::new(
            settings.orchestrator.default_agent.clone(),
            settings.orchestrator.sticky_sessions,
        );
        let orchestrator = Self::new(
            registry,
            Arc::new(InMemorySessionStore::new(settings.sessions.auto_create)),
            Arc::new(router),
            settings.orchestrator.dispatch_settings(),
        )
        .with_history_page_size(settings.orchestrator.history_page_size);

        match metrics {
            Some(metrics) => orchestrator.with_metrics(metrics),
            None => orchestrator,
        }
    }

    pub fn with_history_page_size(mut self, page_size: usize) -> Self {
        self.history_page_size = page_size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.dispatcher = self.dispatcher.with_metrics(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn process_message(
        &self,
        message: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> OrchestratorResult<DispatchResult> {
        self.process_message_with_files(message, user_id, session_id, Vec::new())
            .await
    }

    pub async fn process_message_with_files(
        &self,
        message: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
        attachments: Vec<Attachment>,
    ) -> OrchestratorResult<DispatchResult> {
        self.dispatcher
            .dispatch(DispatchRequest {
                message: message.to_string(),
                user_id: user_id.map(str::to_string),
                session_id: session_id.map(str::to_string),
                attachments,
            })
            .await
    }

    /// Probe every agent now
    pub async fn check_agents_health(&self) -> BTreeMap<String, HealthState> {
        self.registry.check_health().await
    }

    /// Registered agents with last known health, without probing
    pub async fn get_all_agents_status(&self) -> Vec<AgentDescriptor> {
        self.registry.list_agents().await
    }

    /// History of a session, hidden when it belongs to a different user
    pub async fn get_chat_history(
        &self,
        user_id: Option<&str>,
        session_id: &str,
    ) -> OrchestratorResult<Option<ChatHistory>> {
        let history = self.sessions.history(session_id).await?;
        Ok(history.filter(|h| user_id.map_or(true, |user| h.is_visible_to(user))))
    }

    /// The last page of a session's history
    pub async fn get_history_page(
        &self,
        user_id: Option<&str>,
        session_id: &str,
    ) -> OrchestratorResult<Option<HistoryPage>> {
        Ok(self
            .get_chat_history(user_id, session_id)
            .await?
            .map(|h| HistoryPage::from_history(&h, self.history_page_size)))
    }

    /// Remove a session's messages. Returns whether a visible session was
    /// cleared.
    pub async fn clear_chat_history(&self, user_id: Option<&str>, session_id: &str) -> OrchestratorResult<bool> {
        if self.get_chat_history(user_id, session_id).await?.is_none() {
            return Ok(false);
        }
        self.sessions.clear(session_id).await?;
        info!(session_id = %session_id, "Cleared chat history");
        Ok(true)
    }

    /// Forget a session. Returns whether a visible session was removed.
    pub async fn delete_session(&self, user_id: Option<&str>, session_id: &str) -> OrchestratorResult<bool> {
        if self.get_chat_history(user_id, session_id).await?.is_none() {
            return Ok(false);
        }
        let deleted = self.sessions.delete(session_id).await?;
        self.dispatcher.forget_session(session_id).await;
        if deleted {
            info!(session_id = %session_id, "Deleted session");
        }
        Ok(deleted)
    }

    /// Start an empty anonymous session
    pub async fn create_session(&self) -> OrchestratorResult<String> {
        self.start_session(None).await
    }

    /// Start an empty session owned by `user_id`
    pub async fn create_user_session(&self, user_id: &str) -> OrchestratorResult<String> {
        self.start_session(Some(user_id)).await
    }

    async fn start_session(&self, user_id: Option<&str>) -> OrchestratorResult<String> {
        let session_id = Uuid::new_v4().to_string();
        self.sessions.ensure_history(&session_id, user_id).await?;
        info!(session_id = %session_id, user_id = ?user_id, "Created session");
        Ok(session_id)
    }

    /// Summaries of every session, most recently updated first
    pub async fn list_sessions(&self) -> OrchestratorResult<Vec<SessionSummary>> {
        self.sessions.summaries(None).await
    }

    /// Identifiers of the sessions owned by `user_id`, oldest first
    pub async fn get_user_sessions(&self, user_id: &str) -> OrchestratorResult<Vec<String>> {
        self.sessions.list_sessions(Some(user_id)).await
    }

    /// Summaries of the sessions owned by `user_id`
    pub async fn user_session_summaries(&self, user_id: &str) -> OrchestratorResult<Vec<SessionSummary>> {
        self.sessions.summaries(Some(user_id)).await
    }
}
