//! Scripted in-process agent
//!
//! Backs the `mock` transport (an echo agent for local runs) and is the
//! test double for dispatch and health checks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use super::client::{AgentClient, AgentRequest, AgentResponse};
use super::error::{AgentFailure, AgentResult};
use crate::domain::HealthState;

/// What the mock does for one call
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Repeat the message back
    Echo,
    Respond(AgentResponse),
    Fail(AgentFailure),
    /// Wait, then behave like the inner reply
    Delay(Duration, Box<MockReply>),
}

/// Agent client that replays a script of replies.
///
/// Queued replies are consumed one per call; once the queue is empty every
/// call gets the fallback reply.
pub struct MockAgentClient {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    probe_result: AgentResult<HealthState>,
    probe_delay: Option<Duration>,
    calls: AtomicUsize,
    /// Present only for recording clients
    requests: Option<Mutex<Vec<AgentRequest>>>,
}

impl MockAgentClient {
    fn with_fallback(fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            probe_result: Ok(HealthState::Healthy),
            probe_delay: None,
            calls: AtomicUsize::new(0),
            requests: None,
        }
    }

    /// Agent that echoes every message
    pub fn echo() -> Self {
        Self::with_fallback(MockReply::Echo)
    }

    /// Agent that always answers with `response`
    pub fn responding(response: AgentResponse) -> Self {
        Self::with_fallback(MockReply::Respond(response))
    }

    /// Agent whose calls always fail with `failure`
    pub fn failing(failure: AgentFailure) -> Self {
        Self::with_fallback(MockReply::Fail(failure))
    }

    /// Delay every fallback reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.fallback = MockReply::Delay(delay, Box::new(self.fallback));
        self
    }

    /// Keep every request for later inspection with [`requests`](Self::requests)
    pub fn recording(mut self) -> Self {
        self.requests = Some(Mutex::new(Vec::new()));
        self
    }

    /// Queue a reply used before the fallback
    pub fn then(mut self, reply: MockReply) -> Self {
        self.script.get_mut().push_back(reply);
        self
    }

    pub fn with_probe_state(mut self, state: HealthState) -> Self {
        self.probe_result = Ok(state);
        self
    }

    pub fn with_probe_failure(mut self, failure: AgentFailure) -> Self {
        self.probe_result = Err(failure);
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    /// Number of `send` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far; always empty unless built with `recording()`
    pub async fn requests(&self) -> Vec<AgentRequest> {
        match &self.requests {
            Some(requests) => requests.lock().await.clone(),
            None => Vec::new(),
        }
    }

    async fn play(reply: MockReply, request: &AgentRequest) -> AgentResult<AgentResponse> {
        let mut reply = reply;
        loop {
            match reply {
                MockReply::Echo => {
                    let files: Vec<&str> = request.attachments.iter().map(|a| a.name.as_str()).collect();
                    return Ok(AgentResponse {
                        response: format!("Echo: {}", request.message),
                        analysis: None,
                        clarified_message: None,
                        data: (!files.is_empty()).then(|| json!({ "attachments": files })),
                    });
                }
                MockReply::Respond(response) => return Ok(response),
                MockReply::Fail(failure) => return Err(failure),
                MockReply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn send(&self, request: AgentRequest) -> AgentResult<AgentResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(requests) = &self.requests {
            requests.lock().await.push(request.clone());
        }

        let reply = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Self::play(reply, &request).await
    }

    async fn probe(&self) -> AgentResult<HealthState> {
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        self.probe_result.clone()
    }
}
