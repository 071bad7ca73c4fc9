//! Downstream agents
//!
//! - `client` - the [`AgentClient`] capability every transport implements
//! - `registry` - known agents and their concurrently probed health
//! - `health` - background health refresh
//! - `a2a` - JSON-over-HTTP agent-to-agent transport
//! - `mock` - scripted in-process agent
//! - `config` - per-agent configuration

pub mod a2a;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod mock;
pub mod registry;

pub use a2a::A2aClient;
pub use client::*;
pub use config::{AgentConfig, AgentTransport};
pub use error::*;
pub use health::HealthMonitor;
pub use mock::{MockAgentClient, MockReply};
pub use registry::{AgentHandle, AgentRegistry};
