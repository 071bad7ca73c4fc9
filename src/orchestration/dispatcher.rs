//! Request dispatch
//!
//! Each request moves through `Received -> Resolved -> Dispatched` and ends
//! `Completed` or `Failed`. Agent failures end in a failed
//! [`DispatchResult`]; only validation problems, unknown sessions and
//! internal faults come back as errors.
//!
//! Dropping the future returned by [`Dispatcher::dispatch`] (for example when
//! the HTTP client disconnects) cancels the in-flight agent call. Nothing is
//! spawned per request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::routing::{RoutingPolicy, RoutingRequest};
use crate::adapters::metrics_handler::MetricsCollector;
use crate::agents::{AgentFailure, AgentHandle, AgentRegistry, AgentRequest, AgentResponse, AgentResult, SessionContext};
use crate::domain::{
    AgentDescriptor, Attachment, DispatchResult, DispatchStatus, FailureKind, Message,
    MessageMetadata,
};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::session::SessionStore;

/// Tunables for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Number of recent messages forwarded as context
    pub history_window: usize,
    /// Extra attempts after an undelivered request
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Refuse attachments the selected agent has no capability for
    pub strict_attachments: bool,
    /// Run requests for the same session one at a time
    pub serialize_sessions: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            max_retries: 1,
            retry_delay: Duration::from_millis(200),
            strict_attachments: false,
            serialize_sessions: false,
        }
    }
}

/// One inbound message
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub message: String,
    pub user_id: Option<String>,
    /// Generated when absent
    pub session_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl DispatchRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Per-session locks used when requests for one session must not overlap
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    async fn forget(&self, session_id: &str) {
        self.locks.lock().await.remove(session_id);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Selects an agent for each message, calls it, and records the exchange
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    sessions: Arc<dyn SessionStore>,
    router: Arc<dyn RoutingPolicy>,
    settings: DispatchSettings,
    locks: SessionLocks,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<AgentRegistry>,
        sessions: Arc<dyn SessionStore>,
        router: Arc<dyn RoutingPolicy>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            sessions,
            router,
            settings,
            locks: SessionLocks::default(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Drop bookkeeping held for a deleted session
    pub async fn forget_session(&self, session_id: &str) {
        self.locks.forget(session_id).await;
    }

    /// Process one message end to end
    pub async fn dispatch(&self, request: DispatchRequest) -> OrchestratorResult<DispatchResult> {
        let started = Instant::now();

        // Received
        let message = request.message.trim();
        if message.is_empty() {
            return Err(OrchestratorError::Validation(
                "Message must not be empty".to_string(),
            ));
        }
        let user_id = non_blank(request.user_id.as_deref());
        let supplied = non_blank(request.session_id.as_deref());
        let session_id = match supplied {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                info!(session_id = %id, "Generated session id");
                id
            }
        };

        let _guard = if self.settings.serialize_sessions {
            Some(self.locks.acquire(&session_id).await)
        } else {
            None
        };

        let history = match supplied {
            Some(_) => self.sessions.open(&session_id, user_id).await?,
            None => self.sessions.ensure_history(&session_id, user_id).await?,
        };

        let mut user_message = Message::user(message).with_metadata(MessageMetadata {
            attachments: request.attachments.iter().map(|a| a.name.clone()).collect(),
            ..Default::default()
        });

        // Resolved
        let agents = self.registry.snapshot().await;
        let descriptors: Vec<AgentDescriptor> =
            agents.iter().map(|h| h.descriptor.clone()).collect();
        let routing = RoutingRequest {
            message,
            attachments: &request.attachments,
            last_agent: history.last_agent(),
        };

        let Some(selection) = self.router.select(&routing, &descriptors) else {
            warn!(session_id = %session_id, "No agent available to handle message");
            self.sessions.append(&session_id, user_message).await?;
            self.record(None, DispatchStatus::NoHandler, started);
            return Ok(DispatchResult::no_handler(session_id));
        };

        let Some(handle) = agents
            .into_iter()
            .find(|h| h.descriptor.id == selection.agent_id)
        else {
            error!(agent = %selection.agent_id, "Routing selected an agent that is not registered");
            return Err(OrchestratorError::Internal(format!(
                "Routing selected unregistered agent '{}'",
                selection.agent_id
            )));
        };
        debug!(
            session_id = %session_id,
            agent = %handle.descriptor.id,
            reason = %selection.reason,
            health = %handle.descriptor.health,
            "Resolved agent"
        );

        if self.settings.strict_attachments {
            if let Some(file) = request
                .attachments
                .iter()
                .find(|a| !handle.descriptor.has_capability(&a.category()))
            {
                let agent_id = handle.descriptor.id.clone();
                let reason = format!(
                    "Agent '{}' does not accept {} attachments ({})",
                    agent_id,
                    file.category(),
                    file.name
                );
                warn!(session_id = %session_id, agent = %agent_id, "{}", reason);
                user_message.metadata.clarified_message = selection.clarified_message.clone();
                self.sessions.append(&session_id, user_message).await?;
                self.record(Some(agent_id.as_str()), DispatchStatus::Failure, started);

                let mut result =
                    DispatchResult::failure(session_id, &agent_id, FailureKind::AgentRejected, reason);
                result.clarified_message = selection.clarified_message;
                return Ok(result);
            }
        }

        // Dispatched
        let agent_request = AgentRequest {
            message: selection
                .clarified_message
                .clone()
                .unwrap_or_else(|| message.to_string()),
            context: SessionContext {
                session_id: session_id.clone(),
                user_id: user_id.map(str::to_string),
                history: history.recent(self.settings.history_window).to_vec(),
            },
            attachments: request.attachments,
        };
        let agent_id = handle.descriptor.id.clone();

        match self.call_agent(&handle, agent_request).await {
            Ok(response) => {
                let clarified = selection
                    .clarified_message
                    .or_else(|| response.clarified_message.clone());
                user_message.metadata.clarified_message = clarified.clone();
                let agent_message = Message::agent(&agent_id, &response.response).with_metadata(
                    MessageMetadata {
                        agent: Some(agent_id.clone()),
                        analysis: response.analysis.clone(),
                        ..Default::default()
                    },
                );
                self.sessions
                    .append_all(&session_id, vec![user_message, agent_message])
                    .await?;

                info!(
                    session_id = %session_id,
                    agent = %agent_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Dispatch completed"
                );
                self.record(Some(agent_id.as_str()), DispatchStatus::Success, started);

                Ok(DispatchResult {
                    response: response.response,
                    agent_used: Some(agent_id),
                    session_id,
                    clarified_message: clarified,
                    analysis: response.analysis,
                    data: response.data,
                    status: DispatchStatus::Success,
                    error: None,
                    timestamp: Utc::now(),
                })
            }
            Err(failure) => {
                warn!(
                    session_id = %session_id,
                    agent = %agent_id,
                    kind = %failure.kind(),
                    "Dispatch failed: {}",
                    failure
                );
                user_message.metadata.clarified_message = selection.clarified_message.clone();
                self.sessions.append(&session_id, user_message).await?;
                self.record(Some(agent_id.as_str()), DispatchStatus::Failure, started);

                let mut result = DispatchResult::failure(
                    session_id,
                    &agent_id,
                    failure.kind(),
                    format!("Agent '{}' failed: {}", agent_id, failure),
                );
                result.clarified_message = selection.clarified_message;
                Ok(result)
            }
        }
    }

    /// Call the agent, bounded by its timeout, retrying undelivered requests
    async fn call_agent(&self, handle: &AgentHandle, request: AgentRequest) -> AgentResult<AgentResponse> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(handle.timeout, handle.client.send(request.clone())).await {
                Ok(result) => result,
                Err(_) => Err(AgentFailure::Timeout(handle.timeout.as_millis() as u64)),
            };

            match result {
                Err(failure) if failure.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        agent = %handle.descriptor.id,
                        attempt = attempt,
                        "Retrying agent call after: {}",
                        failure
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    fn record(&self, agent: Option<&str>, status: DispatchStatus, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dispatch(agent.unwrap_or("none"), status, started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{MockAgentClient, MockReply};
    use crate::domain::Role;
    use crate::orchestration::CapabilityRouter;
    use crate::session::InMemorySessionStore;

    struct Fixture {
        registry: Arc<AgentRegistry>,
        sessions: Arc<InMemorySessionStore>,
        dispatcher: Dispatcher,
    }

    fn fixture(settings: DispatchSettings) -> Fixture {
        let registry = Arc::new(AgentRegistry::default());
        let sessions = Arc::new(InMemorySessionStore::default());
        let dispatcher = Dispatcher::new(
            registry.clone(),
            sessions.clone(),
            Arc::new(CapabilityRouter::default()),
            settings,
        );
        Fixture {
            registry,
            sessions,
            dispatcher,
        }
    }

    fn fast_retry() -> DispatchSettings {
        DispatchSettings {
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let f = fixture(DispatchSettings::default());
        let err = f.dispatcher.dispatch(DispatchRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_generates_session_id() {
        let f = fixture(DispatchSettings::default());
        f.registry
            .register(AgentDescriptor::new("echo", "mock://echo"), Arc::new(MockAgentClient::echo()))
            .await;

        let first = f.dispatcher.dispatch(DispatchRequest::new("hi")).await.unwrap();
        let second = f.dispatcher.dispatch(DispatchRequest::new("hi")).await.unwrap();
        assert!(!first.session_id.is_empty());
        assert_ne!(first.session_id, second.session_id);
        assert!(Uuid::parse_str(&first.session_id).is_ok());
    }

    #[tokio::test]
    async fn test_no_handler_is_not_an_error() {
        let f = fixture(DispatchSettings::default());
        let result = f
            .dispatcher
            .dispatch(DispatchRequest::new("hello").with_session("s1"))
            .await
            .unwrap();

        assert_eq!(result.status, DispatchStatus::NoHandler);
        assert!(result.agent_used.is_none());
        assert_eq!(f.sessions.recent("s1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_success_records_exchange_and_context() {
        let f = fixture(DispatchSettings::default());
        let client = Arc::new(
            MockAgentClient::responding(AgentResponse {
                response: "Try these frames".to_string(),
                analysis: Some("user wants frames".to_string()),
                clarified_message: None,
                data: Some(serde_json::json!({"products": [1, 2]})),
            })
            .recording(),
        );
        f.registry
            .register(AgentDescriptor::new("advisor", "mock://advisor"), client.clone())
            .await;

        f.dispatcher
            .dispatch(DispatchRequest::new("first").with_session("s1").with_user("alice"))
            .await
            .unwrap();
        let result = f
            .dispatcher
            .dispatch(DispatchRequest::new("second").with_session("s1").with_user("alice"))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.agent_used.as_deref(), Some("advisor"));
        assert_eq!(result.analysis.as_deref(), Some("user wants frames"));
        assert_eq!(result.data.unwrap()["products"][1], 2);

        let history = f.sessions.history("s1").await.unwrap().unwrap();
        assert_eq!(history.message_count(), 4);
        assert_eq!(history.messages[0].role, Role::User);
        assert_eq!(history.messages[1].role, Role::Agent);
        assert_eq!(history.messages[1].metadata.agent.as_deref(), Some("advisor"));
        assert_eq!(history.user_id.as_deref(), Some("alice"));

        let requests = client.requests().await;
        assert_eq!(requests[1].context.history.len(), 2);
        assert_eq!(requests[1].context.user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_context_window_is_bounded() {
        let f = fixture(DispatchSettings {
            history_window: 3,
            ..Default::default()
        });
        let client = Arc::new(MockAgentClient::echo().recording());
        f.registry
            .register(AgentDescriptor::new("echo", "mock://echo"), client.clone())
            .await;

        for i in 0..5 {
            f.dispatcher
                .dispatch(DispatchRequest::new(format!("m{}", i)).with_session("s1"))
                .await
                .unwrap();
        }

        let last = client.requests().await.pop().unwrap();
        assert_eq!(last.context.history.len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_records_only_user_message() {
        let f = fixture(DispatchSettings::default());
        f.registry
            .register_with_timeout(
                AgentDescriptor::new("slow", "mock://slow"),
                Arc::new(MockAgentClient::echo().with_delay(Duration::from_secs(5))),
                Duration::from_millis(50),
            )
            .await;

        let result = f
            .dispatcher
            .dispatch(DispatchRequest::new("are you there?").with_session("s1"))
            .await
            .unwrap();

        assert_eq!(result.status, DispatchStatus::Failure);
        assert_eq!(result.failure_kind(), Some(FailureKind::AgentTimeout));
        assert_eq!(result.agent_used.as_deref(), Some("slow"));

        let history = f.sessions.history("s1").await.unwrap().unwrap();
        assert_eq!(history.message_count(), 1);
        assert_eq!(history.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_retries_undelivered_request_once() {
        let f = fixture(fast_retry());
        let client = Arc::new(
            MockAgentClient::echo().then(MockReply::Fail(AgentFailure::connection("reset"))),
        );
        f.registry
            .register(AgentDescriptor::new("echo", "mock://echo"), client.clone())
            .await;

        let result = f.dispatcher.dispatch(DispatchRequest::new("hi")).await.unwrap();
        assert!(result.is_success());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let f = fixture(fast_retry());
        let client = Arc::new(MockAgentClient::failing(AgentFailure::connection("refused")));
        f.registry
            .register(AgentDescriptor::new("down", "mock://down"), client.clone())
            .await;

        let result = f.dispatcher.dispatch(DispatchRequest::new("hi")).await.unwrap();
        assert_eq!(result.failure_kind(), Some(FailureKind::AgentUnreachable));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let f = fixture(fast_retry());
        let client = Arc::new(MockAgentClient::failing(AgentFailure::Rejected("no".into())));
        f.registry
            .register(AgentDescriptor::new("picky", "mock://picky"), client.clone())
            .await;

        let result = f.dispatcher.dispatch(DispatchRequest::new("hi")).await.unwrap();
        assert_eq!(result.failure_kind(), Some(FailureKind::AgentRejected));
        assert_eq!(client.call_count(), 1);
        assert!(result.response.contains("picky"));
    }

    #[tokio::test]
    async fn test_hint_is_forwarded_as_clarified_message() {
        let f = fixture(DispatchSettings::default());
        let client = Arc::new(MockAgentClient::echo().recording());
        f.registry
            .register(AgentDescriptor::new("advisor", "mock://advisor"), Arc::new(MockAgentClient::echo()))
            .await;
        f.registry
            .register(AgentDescriptor::new("order", "mock://order"), client.clone())
            .await;

        let result = f
            .dispatcher
            .dispatch(DispatchRequest::new("@order where is my parcel"))
            .await
            .unwrap();

        assert_eq!(result.agent_used.as_deref(), Some("order"));
        assert_eq!(result.clarified_message.as_deref(), Some("where is my parcel"));
        assert_eq!(client.requests().await[0].message, "where is my parcel");
    }

    #[tokio::test]
    async fn test_mismatched_attachment_forwarded_by_default() {
        let f = fixture(DispatchSettings::default());
        let client = Arc::new(MockAgentClient::echo().recording());
        f.registry
            .register(
                AgentDescriptor::new("text", "mock://text").with_capabilities(["text"]),
                client.clone(),
            )
            .await;

        let file = Attachment::from_upload(b"%PDF", Some("a.pdf"), Some("application/pdf")).unwrap();
        let result = f
            .dispatcher
            .dispatch(DispatchRequest::new("read this").with_attachments(vec![file]))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(client.requests().await[0].attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_strict_attachments() {
        let f = fixture(DispatchSettings {
            strict_attachments: true,
            ..Default::default()
        });
        let client = Arc::new(MockAgentClient::echo());
        f.registry
            .register(
                AgentDescriptor::new("text", "mock://text").with_capabilities(["text"]),
                client.clone(),
            )
            .await;

        let file = Attachment::from_upload(b"%PDF", Some("a.pdf"), Some("application/pdf")).unwrap();
        let result = f
            .dispatcher
            .dispatch(
                DispatchRequest::new("read this")
                    .with_session("s1")
                    .with_attachments(vec![file]),
            )
            .await
            .unwrap();

        assert_eq!(result.status, DispatchStatus::Failure);
        assert_eq!(result.failure_kind(), Some(FailureKind::AgentRejected));
        assert_eq!(result.agent_used.as_deref(), Some("text"));
        assert!(result.response.contains("a.pdf"));
        assert_eq!(client.call_count(), 0);

        let history = f.sessions.history("s1").await.unwrap().unwrap();
        assert_eq!(history.message_count(), 1);
        assert_eq!(history.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_unknown_session_without_auto_create() {
        let registry = Arc::new(AgentRegistry::default());
        let dispatcher = Dispatcher::new(
            registry,
            Arc::new(InMemorySessionStore::new(false)),
            Arc::new(CapabilityRouter::default()),
            DispatchSettings::default(),
        );

        let err = dispatcher
            .dispatch(DispatchRequest::new("hi").with_session("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionNotFound(_)));

        // Fresh sessions are still created
        assert!(dispatcher.dispatch(DispatchRequest::new("hi")).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_on_one_session() {
        let f = Arc::new(fixture(DispatchSettings {
            serialize_sessions: true,
            ..Default::default()
        }));
        f.registry
            .register(
                AgentDescriptor::new("echo", "mock://echo"),
                Arc::new(MockAgentClient::echo().with_delay(Duration::from_millis(5))),
            )
            .await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                f.dispatcher
                    .dispatch(DispatchRequest::new(format!("q{}", i)).with_session("shared"))
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_success());
        }

        let history = f.sessions.history("shared").await.unwrap().unwrap();
        assert_eq!(history.message_count(), 20);
        for pair in history.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].content, format!("Echo: {}", pair[0].content));
        }
    }
}
