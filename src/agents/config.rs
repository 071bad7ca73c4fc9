//! Configuration types for downstream agents

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{A2aClient, AgentClient, MockAgentClient};
use crate::domain::AgentDescriptor;

/// Configuration for one downstream agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Base URL of the agent (required for `a2a`)
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub transport: AgentTransport,
    /// Capability tags (e.g. "image", "pdf", "order")
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Extra routing words
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Timeout in seconds for one call
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

/// How the orchestrator reaches an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentTransport {
    /// JSON over HTTP
    #[default]
    A2a,
    /// In-process echo agent
    Mock,
}

impl std::fmt::Display for AgentTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentTransport::A2a => write!(f, "a2a"),
            AgentTransport::Mock => write!(f, "mock"),
        }
    }
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Registry descriptor for this agent
    pub fn descriptor(&self) -> AgentDescriptor {
        let endpoint = match self.transport {
            AgentTransport::Mock if self.url.is_empty() => format!("mock://{}", self.name),
            _ => self.url.clone(),
        };

        AgentDescriptor::new(&self.name, endpoint)
            .with_description(&self.description)
            .with_capabilities(self.capabilities.iter().cloned())
            .with_keywords(self.keywords.iter().cloned())
    }

    /// Client for the configured transport
    pub fn build_client(&self) -> Arc<dyn AgentClient> {
        match self.transport {
            AgentTransport::A2a => Arc::new(A2aClient::new(&self.name, &self.url, self.timeout())),
            AgentTransport::Mock => Arc::new(MockAgentClient::echo()),
        }
    }
}
