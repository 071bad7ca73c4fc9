//! Dispatch outcome types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response text used when no agent can take a request
pub const NO_HANDLER_RESPONSE: &str = "No agent is available to handle this request.";

/// Terminal status of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    Failure,
    /// The registry was empty; nothing was invoked
    NoHandler,
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchStatus::Success => write!(f, "success"),
            DispatchStatus::Failure => write!(f, "failure"),
            DispatchStatus::NoHandler => write!(f, "no_handler"),
        }
    }
}

/// Why an agent call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AgentUnreachable,
    AgentTimeout,
    AgentProtocolError,
    AgentRejected,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::AgentUnreachable => write!(f, "agent_unreachable"),
            FailureKind::AgentTimeout => write!(f, "agent_timeout"),
            FailureKind::AgentProtocolError => write!(f, "agent_protocol_error"),
            FailureKind::AgentRejected => write!(f, "agent_rejected"),
        }
    }
}

/// Failure details carried by a failed dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub kind: FailureKind,
    /// Human-readable diagnostic
    pub message: String,
}

/// Unified result of processing one inbound message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub response: String,
    /// Agent that produced the response; `None` when no agent was invoked
    pub agent_used: Option<String>,
    pub session_id: String,
    /// Text actually forwarded, when it differs from the user's input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarified_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchFailure>,
    pub timestamp: DateTime<Utc>,
}

impl DispatchResult {
    pub fn no_handler(session_id: impl Into<String>) -> Self {
        Self {
            response: NO_HANDLER_RESPONSE.to_string(),
            agent_used: None,
            session_id: session_id.into(),
            clarified_message: None,
            analysis: None,
            data: None,
            status: DispatchStatus::NoHandler,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        session_id: impl Into<String>,
        agent: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            response: message.clone(),
            agent_used: Some(agent.into()),
            session_id: session_id.into(),
            clarified_message: None,
            analysis: None,
            data: None,
            status: DispatchStatus::Failure,
            error: Some(DispatchFailure { kind, message }),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DispatchStatus::Success
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
