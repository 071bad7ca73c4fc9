//! Agent selection policy

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::domain::{AgentDescriptor, Attachment};

/// What the router gets to look at
#[derive(Debug, Clone, Copy)]
pub struct RoutingRequest<'a> {
    pub message: &'a str,
    pub attachments: &'a [Attachment],
    /// Agent that produced the last reply in this session
    pub last_agent: Option<&'a str>,
}

/// Why an agent was picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Explicit `@agent` mention in the message
    Hint,
    /// Same agent as the previous turn of the session
    Sticky,
    /// Capability or keyword match
    Capability,
    /// Nothing matched; default agent
    Fallback,
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionReason::Hint => write!(f, "hint"),
            SelectionReason::Sticky => write!(f, "sticky"),
            SelectionReason::Capability => write!(f, "capability"),
            SelectionReason::Fallback => write!(f, "fallback"),
        }
    }
}

/// Outcome of agent selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub agent_id: String,
    /// Message to forward when it differs from the input
    pub clarified_message: Option<String>,
    pub reason: SelectionReason,
}

impl Selection {
    fn new(agent_id: &str, reason: SelectionReason) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            clarified_message: None,
            reason,
        }
    }
}

/// Decides which agent handles a message.
///
/// `agents` is in registration order with last known health filled in.
/// Returning `None` means no agent can take the request.
pub trait RoutingPolicy: Send + Sync {
    fn select(&self, request: &RoutingRequest<'_>, agents: &[AgentDescriptor]) -> Option<Selection>;
}

/// Default policy: explicit hint, then (optionally) the session's previous
/// agent, then capability scoring, then the default agent.
///
/// Scoring gives 2 points per capability tag equal to an attachment category
/// and 1 point per capability tag or keyword appearing as a word of the
/// message. Ties go to the healthier agent, then to the one registered first.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRouter {
    default_agent: Option<String>,
    sticky_sessions: bool,
}

impl CapabilityRouter {
    pub fn new(default_agent: Option<String>, sticky_sessions: bool) -> Self {
        Self {
            default_agent,
            sticky_sessions,
        }
    }

    fn find<'a>(agents: &'a [AgentDescriptor], id: &str) -> Option<&'a AgentDescriptor> {
        agents.iter().find(|a| a.id.eq_ignore_ascii_case(id))
    }

    /// `@name rest of message` addressed to a registered agent
    fn hinted(message: &str, agents: &[AgentDescriptor]) -> Option<Selection> {
        let rest = message.trim_start().strip_prefix('@')?;
        let (name, remainder) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let name = name.trim_end_matches(|c: char| c == ':' || c == ',');
        let agent = Self::find(agents, name)?;

        let remainder = remainder.trim();
        Some(Selection {
            agent_id: agent.id.clone(),
            clarified_message: (!remainder.is_empty()).then(|| remainder.to_string()),
            reason: SelectionReason::Hint,
        })
    }

    fn score(agent: &AgentDescriptor, categories: &HashSet<String>, words: &HashSet<String>) -> usize {
        let attachment_hits = agent
            .capabilities
            .iter()
            .filter(|c| categories.contains(&c.to_lowercase()))
            .count();
        let word_hits = agent
            .capabilities
            .iter()
            .chain(agent.keywords.iter())
            .filter(|tag| words.contains(&tag.to_lowercase()))
            .count();
        attachment_hits * 2 + word_hits
    }

    fn by_capability(request: &RoutingRequest<'_>, agents: &[AgentDescriptor]) -> Option<Selection> {
        let categories: HashSet<String> = request
            .attachments
            .iter()
            .map(|a| a.category().to_lowercase())
            .collect();
        let words: HashSet<String> = request
            .message
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        agents
            .iter()
            .enumerate()
            .map(|(index, agent)| (Self::score(agent, &categories, &words), index, agent))
            .filter(|(score, _, _)| *score > 0)
            .min_by_key(|(score, index, agent)| (Reverse(*score), agent.health.rank(), *index))
            .map(|(_, _, agent)| Selection::new(&agent.id, SelectionReason::Capability))
    }

    fn fallback(&self, agents: &[AgentDescriptor]) -> Option<Selection> {
        if let Some(default) = self.default_agent.as_deref() {
            if let Some(agent) = Self::find(agents, default) {
                return Some(Selection::new(&agent.id, SelectionReason::Fallback));
            }
        }

        agents
            .iter()
            .enumerate()
            .min_by_key(|(index, agent)| (agent.health.rank(), *index))
            .map(|(_, agent)| Selection::new(&agent.id, SelectionReason::Fallback))
    }
}

impl RoutingPolicy for CapabilityRouter {
    fn select(&self, request: &RoutingRequest<'_>, agents: &[AgentDescriptor]) -> Option<Selection> {
        if agents.is_empty() {
            return None;
        }

        if let Some(selection) = Self::hinted(request.message, agents) {
            return Some(selection);
        }

        if self.sticky_sessions {
            if let Some(agent) = request.last_agent.and_then(|id| Self::find(agents, id)) {
                return Some(Selection::new(&agent.id, SelectionReason::Sticky));
            }
        }

        Self::by_capability(request, agents).or_else(|| self.fallback(agents))
    }
}
