//! Error types for the orchestration core

use thiserror::Error;

use crate::domain::AttachmentError;

/// Errors returned by the orchestrator.
///
/// Agent failures are not in here: the dispatcher turns them into a failed
/// [`DispatchResult`](crate::domain::DispatchResult).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Empty or malformed input, rejected before dispatch
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller-supplied session does not exist and auto-creation is disabled
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
