//! Error types for agent calls

use thiserror::Error;

use crate::domain::FailureKind;

/// Ways a call to a downstream agent can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentFailure {
    /// Transport could not reach the agent
    #[error("Agent unreachable: {reason}")]
    Unreachable {
        reason: String,
        /// Whether the request never reached the agent (connection refused or
        /// reset), so sending it again is safe
        retryable: bool,
    },

    /// Call exceeded its time bound
    #[error("Agent did not answer within {0}ms")]
    Timeout(u64),

    /// Agent answered with something that could not be understood
    #[error("Malformed agent response: {0}")]
    ProtocolError(String),

    /// Agent declined the request
    #[error("Agent rejected the request: {0}")]
    Rejected(String),
}

impl AgentFailure {
    pub fn unreachable(reason: impl Into<String>) -> Self {
        AgentFailure::Unreachable {
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Connection-level failure where the request was not delivered
    pub fn connection(reason: impl Into<String>) -> Self {
        AgentFailure::Unreachable {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AgentFailure::Unreachable { .. } => FailureKind::AgentUnreachable,
            AgentFailure::Timeout(_) => FailureKind::AgentTimeout,
            AgentFailure::ProtocolError(_) => FailureKind::AgentProtocolError,
            AgentFailure::Rejected(_) => FailureKind::AgentRejected,
        }
    }

    /// Only undelivered requests are retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentFailure::Unreachable { retryable: true, .. })
    }
}

/// Result type alias for agent calls
pub type AgentResult<T> = Result<T, AgentFailure>;
