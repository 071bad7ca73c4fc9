//! Agent descriptor and health types

use serde::{Deserialize, Serialize};

/// Advisory liveness classification of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Never probed
    #[default]
    Unknown,
    Healthy,
    /// Reachable but reporting problems
    Degraded,
    /// Probe failed or timed out
    Unreachable,
}

impl HealthState {
    /// Preference order used when several agents are equally suitable.
    /// Lower is better.
    pub fn rank(self) -> u8 {
        match self {
            HealthState::Healthy => 0,
            HealthState::Unknown => 1,
            HealthState::Degraded => 2,
            HealthState::Unreachable => 3,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Unknown => write!(f, "unknown"),
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// A downstream agent known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable agent identifier
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Capability tags, matched against attachment categories and message words
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Extra words that route a message to this agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Transport endpoint reference (URL for A2A agents)
    pub endpoint: String,
    /// Last known health; maintained by the registry
    #[serde(default)]
    pub health: HealthState,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            capabilities: Vec::new(),
            keywords: Vec::new(),
            endpoint: endpoint.into(),
            health: HealthState::Unknown,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive capability lookup
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(tag))
    }
}
