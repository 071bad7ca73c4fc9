//! Agent-to-agent client over HTTP
//!
//! Talks to a downstream agent exposing two endpoints:
//!
//! - `POST {base_url}/message` with an [`AgentRequest`] JSON body, answered by
//!   `{"response": ..., "analysis": ..., "clarified_message": ..., "data": ...}`.
//!   An optional `"status": "rejected" | "error"` with `"error"` text marks a
//!   refusal.
//! - `GET {base_url}/health`, answered by any 2xx (optionally
//!   `{"status": "degraded"}`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::client::{AgentClient, AgentRequest, AgentResponse};
use super::error::{AgentFailure, AgentResult};
use crate::domain::HealthState;

/// Reply body of the `/message` endpoint
#[derive(Debug, Deserialize)]
struct MessageReply {
    response: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    clarified_message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Reply body of the `/health` endpoint
#[derive(Debug, Default, Deserialize)]
struct HealthReply {
    #[serde(default)]
    status: Option<String>,
}

/// HTTP client for one downstream agent
pub struct A2aClient {
    name: String,
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl A2aClient {
    /// Create a client whose calls are bounded by `timeout`
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, err: reqwest::Error) -> AgentFailure {
        if err.is_timeout() {
            AgentFailure::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_connect() {
            AgentFailure::connection(format!("Connection error: {}", err))
        } else if err.is_decode() || err.is_body() {
            AgentFailure::ProtocolError(err.to_string())
        } else {
            AgentFailure::unreachable(err.to_string())
        }
    }

    fn status_failure(&self, status: StatusCode, body: String) -> AgentFailure {
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, body.trim())
        };

        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                AgentFailure::Timeout(self.timeout.as_millis() as u64)
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                AgentFailure::unreachable(detail)
            }
            s if s.is_client_error() => AgentFailure::Rejected(detail),
            _ => AgentFailure::ProtocolError(detail),
        }
    }
}

#[async_trait]
impl AgentClient for A2aClient {
    async fn send(&self, request: AgentRequest) -> AgentResult<AgentResponse> {
        let url = format!("{}/message", self.base_url);
        debug!(agent = %self.name, url = %url, "Sending message to agent");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_failure(status, body));
        }

        let reply: MessageReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                AgentFailure::ProtocolError(format!("Invalid reply body: {}", e))
            }
        })?;

        if let Some(status) = reply.status.as_deref() {
            if status.eq_ignore_ascii_case("rejected") || status.eq_ignore_ascii_case("error") {
                let reason = reply
                    .error
                    .or(reply.response)
                    .unwrap_or_else(|| status.to_string());
                return Err(AgentFailure::Rejected(reason));
            }
        }

        let text = reply
            .response
            .ok_or_else(|| AgentFailure::ProtocolError("Reply has no `response` field".to_string()))?;

        Ok(AgentResponse {
            response: text,
            analysis: reply.analysis,
            clarified_message: reply.clarified_message,
            data: reply.data,
        })
    }

    async fn probe(&self) -> AgentResult<HealthState> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            debug!(agent = %self.name, status = %response.status(), "Health endpoint not OK");
            return Ok(HealthState::Degraded);
        }

        let reply: HealthReply = response.json().await.unwrap_or_default();
        match reply.status.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("degraded") => Ok(HealthState::Degraded),
            _ => Ok(HealthState::Healthy),
        }
    }
}
