//! Session storage for chat histories
//!
//! The store is the only shared mutable state written by concurrent
//! dispatches. Implementations serialize writes per session and let
//! unrelated sessions proceed independently.

mod in_memory;

pub use in_memory::InMemorySessionStore;

use async_trait::async_trait;

use crate::domain::{ChatHistory, Message, SessionSummary};
use crate::error::OrchestratorResult;

/// Trait for chat history storage backends
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the history for `session_id`, creating an empty one if needed.
    ///
    /// Idempotent. A `user_id` is recorded as the owner when the session has
    /// none yet.
    async fn ensure_history(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> OrchestratorResult<ChatHistory>;

    /// Resolve a caller-supplied session for an incoming message.
    ///
    /// Behaves like [`ensure_history`](Self::ensure_history) when the store
    /// auto-creates sessions; otherwise an unknown session is
    /// `SessionNotFound`. A session owned by a different user is also
    /// reported as `SessionNotFound`.
    async fn open(&self, session_id: &str, user_id: Option<&str>) -> OrchestratorResult<ChatHistory>;

    /// Append one message
    async fn append(&self, session_id: &str, message: Message) -> OrchestratorResult<()> {
        self.append_all(session_id, vec![message]).await
    }

    /// Append several messages as one uninterrupted run
    async fn append_all(&self, session_id: &str, messages: Vec<Message>) -> OrchestratorResult<()>;

    /// Snapshot of a session's history
    async fn history(&self, session_id: &str) -> OrchestratorResult<Option<ChatHistory>>;

    /// The last `limit` messages in insertion order; empty for unknown sessions
    async fn recent(&self, session_id: &str, limit: usize) -> OrchestratorResult<Vec<Message>>;

    /// Remove all messages of a session. Unknown sessions are ignored.
    async fn clear(&self, session_id: &str) -> OrchestratorResult<()>;

    /// Forget a session entirely. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> OrchestratorResult<bool>;

    /// Session identifiers, optionally restricted to one user's sessions
    async fn list_sessions(&self, user_id: Option<&str>) -> OrchestratorResult<Vec<String>>;

    /// Summaries of sessions, most recently updated first
    async fn summaries(&self, user_id: Option<&str>) -> OrchestratorResult<Vec<SessionSummary>>;
}
