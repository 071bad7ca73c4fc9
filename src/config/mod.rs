use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

pub mod validator;

use crate::agents::AgentConfig;
use crate::cli::Cli;
use crate::orchestration::DispatchSettings;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
    #[serde(default)]
    pub health: HealthSettings,
    /// Downstream agents, registered in this order
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Dispatch and routing behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Recent messages forwarded to agents as context
    pub history_window: usize,
    /// Messages returned by the history endpoint
    pub history_page_size: usize,
    /// Extra attempts when an agent could not be reached
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Agent used when nothing else matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
    /// Reject attachments the selected agent has no capability for
    pub strict_attachments: bool,
    /// Process requests of one session one at a time
    pub serialize_sessions: bool,
    /// Keep talking to the agent that answered last in a session
    pub sticky_sessions: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            history_page_size: 50,
            max_retries: 1,
            retry_delay_ms: 200,
            default_agent: None,
            strict_attachments: false,
            serialize_sessions: false,
            sticky_sessions: false,
        }
    }
}

impl OrchestratorSettings {
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            history_window: self.history_window,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            strict_attachments: self.strict_attachments,
            serialize_sessions: self.serialize_sessions,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Create unknown caller-supplied sessions on first message
    pub auto_create: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { auto_create: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Upper bound for one liveness probe
    pub probe_timeout_ms: u64,
    /// Background refresh interval; 0 disables the monitor
    pub interval_seconds: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3000,
            interval_seconds: 0,
        }
    }
}

impl HealthSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// `None` when the background monitor is disabled
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_seconds > 0).then(|| Duration::from_secs(self.interval_seconds))
    }
}

impl Settings {
    /// Create settings from CLI arguments (includes config file and CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::read(&cli.config)?;

        // Apply CLI overrides (CLI > env vars > config file)
        settings.apply_cli_overrides(cli);

        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a config file. A missing file yields
    /// the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let settings = Self::read(path.as_ref())?;
        settings.validate()?;
        Ok(settings)
    }

    fn read(path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(interval) = cli.health_interval {
            self.health.interval_seconds = interval;
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    /// Agents that should be registered at startup
    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter().filter(|agent| agent.enabled)
    }
}
