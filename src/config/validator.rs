use std::collections::HashMap;
use thiserror::Error;

use crate::agents::{AgentConfig, AgentTransport};
use crate::config::{HealthSettings, OrchestratorSettings, ServerSettings, Settings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_server(&settings.server) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_orchestrator(&settings.orchestrator) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_health(&settings.health) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_agents(&settings.agents) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_cross_references(settings) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_orchestrator(orchestrator: &OrchestratorSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if orchestrator.history_page_size == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "orchestrator.history_page_size".to_string(),
                reason: "Page size must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_health(health: &HealthSettings) -> Result<(), Vec<ValidationError>> {
        if health.probe_timeout_ms == 0 {
            return Err(vec![ValidationError::InvalidValue {
                field: "health.probe_timeout_ms".to_string(),
                reason: "Probe timeout must be greater than 0".to_string(),
            }]);
        }
        Ok(())
    }

    fn validate_agents(agents: &[AgentConfig]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen_names = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if let Some(prev_idx) = seen_names.insert(agent.name.as_str(), idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Agent name '{}' appears at indices {} and {}",
                    agent.name, prev_idx, idx
                )));
            }

            if agent.name.trim().is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].name", idx)));
            }

            if agent.transport == AgentTransport::A2a && agent.url.trim().is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].url", idx)));
            }

            if agent.timeout_seconds == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("agents[{}].timeout_seconds", idx),
                    reason: "Timeout must be greater than 0".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_cross_references(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let Some(default_agent) = settings.orchestrator.default_agent.as_deref() else {
            return Ok(());
        };

        if settings.enabled_agents().any(|a| a.name == default_agent) {
            Ok(())
        } else {
            Err(vec![ValidationError::CrossReference(format!(
                "orchestrator.default_agent '{}' is not an enabled agent",
                default_agent
            ))])
        }
    }
}
