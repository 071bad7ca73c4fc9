//! Chat message and history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a session's last-message preview
pub const PREVIEW_CHARS: usize = 100;

/// Author of a message in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message sent by the end user
    User,
    /// Reply produced by a downstream agent
    Agent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// Optional details recorded alongside a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Agent that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Analysis text returned by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    /// Rewritten form of the user's message that was actually forwarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarified_message: Option<String>,
    /// Names of the files that came with the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl MessageMetadata {
    fn is_empty(&self) -> bool {
        self == &MessageMetadata::default()
    }
}

/// A single entry of a chat history. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "MessageMetadata::is_empty")]
    pub metadata: MessageMetadata,
}

impl Message {
    /// Create a user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    /// Create an agent reply stamped with the current time
    pub fn agent(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata {
                agent: Some(agent.into()),
                ..Default::default()
            },
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Content truncated to `max_chars` characters, with `...` appended when cut
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Ordered message log of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub session_id: String,
    /// User the session belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ChatHistory {
    /// Create an empty history
    pub fn new(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            messages: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Append a message, keeping timestamps non-decreasing.
    ///
    /// A message stamped before the current `last_updated` (possible when
    /// concurrent exchanges finish out of order) is re-stamped to
    /// `last_updated` before it is stored.
    pub fn push(&mut self, mut message: Message) {
        if message.timestamp < self.last_updated {
            message.timestamp = self.last_updated;
        }
        let now = Utc::now().max(self.last_updated);
        self.last_updated = now.max(message.timestamp);
        self.messages.push(message);
    }

    /// Remove every message. The session itself survives.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_updated = Utc::now().max(self.last_updated);
    }

    /// The last `limit` messages in insertion order
    pub fn recent(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Agent that produced the most recent agent reply
    pub fn last_agent(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Agent)
            .and_then(|m| m.metadata.agent.as_deref())
    }

    /// Whether `user_id` may read or modify this history.
    /// Sessions without an owner are visible to everybody.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.user_id.as_deref().map_or(true, |owner| owner == user_id)
    }

    pub fn to_summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            last_updated: self.last_updated,
            message_count: self.messages.len(),
            last_message_preview: self
                .messages
                .last()
                .map(|m| m.preview(PREVIEW_CHARS))
                .unwrap_or_default(),
        }
    }
}

/// Listing entry for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub message_count: usize,
    pub last_message_preview: String,
}
