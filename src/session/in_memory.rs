//! In-memory session store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::SessionStore;
use crate::domain::{ChatHistory, Message, SessionSummary};
use crate::error::{OrchestratorError, OrchestratorResult};

type SharedHistory = Arc<Mutex<ChatHistory>>;

/// In-memory session store with one lock per session.
///
/// The outer map lock is only held long enough to look up or insert a
/// session handle; reads and writes of a history happen under that
/// session's own mutex.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SharedHistory>>,
    auto_create: bool,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InMemorySessionStore {
    /// Create a new in-memory store
    pub fn new(auto_create: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            auto_create,
        }
    }

    async fn get(&self, session_id: &str) -> Option<SharedHistory> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn get_or_insert(&self, session_id: &str, user_id: Option<&str>) -> (SharedHistory, bool) {
        if let Some(existing) = self.get(session_id).await {
            return (existing, false);
        }

        let mut sessions = self.sessions.write().await;
        let mut created = false;
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(ChatHistory::new(
                    session_id,
                    user_id.map(str::to_string),
                )))
            })
            .clone();
        (entry, created)
    }

    async fn snapshot(&self) -> Vec<SharedHistory> {
        self.sessions.read().await.values().cloned().collect()
    }

    async fn matching(&self, user_id: Option<&str>) -> Vec<ChatHistory> {
        let mut histories = Vec::new();
        for shared in self.snapshot().await {
            let history = shared.lock().await;
            if user_id.map_or(true, |user| history.user_id.as_deref() == Some(user)) {
                histories.push(history.clone());
            }
        }
        histories
    }
}

fn claim(history: &mut ChatHistory, user_id: Option<&str>) {
    if history.user_id.is_none() {
        history.user_id = user_id.map(str::to_string);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn ensure_history(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> OrchestratorResult<ChatHistory> {
        let (shared, created) = self.get_or_insert(session_id, user_id).await;
        if created {
            tracing::info!(session_id = %session_id, "Created chat history");
        }
        let mut history = shared.lock().await;
        claim(&mut history, user_id);
        Ok(history.clone())
    }

    async fn open(&self, session_id: &str, user_id: Option<&str>) -> OrchestratorResult<ChatHistory> {
        let shared = match self.get(session_id).await {
            Some(shared) => shared,
            None if self.auto_create => return self.ensure_history(session_id, user_id).await,
            None => return Err(OrchestratorError::SessionNotFound(session_id.to_string())),
        };

        let mut history = shared.lock().await;
        if let Some(user) = user_id {
            if !history.is_visible_to(user) {
                return Err(OrchestratorError::SessionNotFound(session_id.to_string()));
            }
        }
        claim(&mut history, user_id);
        Ok(history.clone())
    }

    async fn append_all(&self, session_id: &str, messages: Vec<Message>) -> OrchestratorResult<()> {
        let shared = match self.get(session_id).await {
            Some(shared) => shared,
            None if self.auto_create => self.get_or_insert(session_id, None).await.0,
            None => return Err(OrchestratorError::SessionNotFound(session_id.to_string())),
        };

        let mut history = shared.lock().await;
        for message in messages {
            history.push(message);
        }
        Ok(())
    }

    async fn history(&self, session_id: &str) -> OrchestratorResult<Option<ChatHistory>> {
        match self.get(session_id).await {
            Some(shared) => Ok(Some(shared.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn recent(&self, session_id: &str, limit: usize) -> OrchestratorResult<Vec<Message>> {
        match self.get(session_id).await {
            Some(shared) => Ok(shared.lock().await.recent(limit).to_vec()),
            None => Ok(Vec::new()),
        }
    }

    async fn clear(&self, session_id: &str) -> OrchestratorResult<()> {
        if let Some(shared) = self.get(session_id).await {
            shared.lock().await.clear();
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> OrchestratorResult<bool> {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        Ok(removed)
    }

    async fn list_sessions(&self, user_id: Option<&str>) -> OrchestratorResult<Vec<String>> {
        let mut histories = self.matching(user_id).await;
        histories.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(histories.into_iter().map(|h| h.session_id).collect())
    }

    async fn summaries(&self, user_id: Option<&str>) -> OrchestratorResult<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = self
            .matching(user_id)
            .await
            .iter()
            .map(ChatHistory::to_summary)
            .collect();

        // Sort by last_updated descending
        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(summaries)
    }
}
