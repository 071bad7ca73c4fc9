//! The agent client abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AgentResult;
use crate::domain::{Attachment, HealthState, Message};

/// Conversation context forwarded with every agent call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Bounded window of the most recent messages, oldest first
    #[serde(default)]
    pub history: Vec<Message>,
}

/// A request for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    pub context: SessionContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Successful answer from an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    /// Agent's own restatement of the request, if it made one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarified_message: Option<String>,
    /// Structured payload (product lists, order details, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AgentResponse {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Default::default()
        }
    }
}

/// Capability to talk to one downstream agent.
///
/// Implementations bound the duration of every call and report failures as
/// [`AgentFailure`](super::AgentFailure) values rather than panicking.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send a message (with context and attachments) and wait for the answer
    async fn send(&self, request: AgentRequest) -> AgentResult<AgentResponse>;

    /// Liveness probe
    async fn probe(&self) -> AgentResult<HealthState>;
}
