//! Agent registry and concurrent health checks

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;

use super::client::AgentClient;
use crate::adapters::metrics_handler::MetricsCollector;
use crate::domain::{AgentDescriptor, HealthState};

/// Default bound on a single liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default bound on a single agent call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// A registered agent together with the client used to reach it
#[derive(Clone)]
pub struct AgentHandle {
    /// Descriptor with the last known health filled in
    pub descriptor: AgentDescriptor,
    pub client: Arc<dyn AgentClient>,
    /// Upper bound for one call to this agent
    pub timeout: Duration,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("descriptor", &self.descriptor)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Known downstream agents, in registration order, plus their health map.
///
/// Only [`check_health`](Self::check_health) writes the health map. Probes
/// run without holding any lock, so readers always get the last known state
/// immediately.
pub struct AgentRegistry {
    agents: RwLock<Vec<AgentHandle>>,
    health: RwLock<HashMap<String, HealthState>>,
    probe_timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            agents: RwLock::new(Vec::new()),
            health: RwLock::new(HashMap::new()),
            probe_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Register an agent with the default call timeout
    pub async fn register(&self, descriptor: AgentDescriptor, client: Arc<dyn AgentClient>) {
        self.register_with_timeout(descriptor, client, DEFAULT_CALL_TIMEOUT)
            .await
    }

    /// Register an agent, replacing any agent with the same id in place
    pub async fn register_with_timeout(
        &self,
        mut descriptor: AgentDescriptor,
        client: Arc<dyn AgentClient>,
        timeout: Duration,
    ) {
        descriptor.health = HealthState::Unknown;
        let id = descriptor.id.clone();
        let handle = AgentHandle {
            descriptor,
            client,
            timeout,
        };

        let mut agents = self.agents.write().await;
        match agents.iter_mut().find(|a| a.descriptor.id == id) {
            Some(existing) => *existing = handle,
            None => agents.push(handle),
        }
        self.health.write().await.remove(&id);
        tracing::info!(agent = %id, "Registered agent");
    }

    /// Remove an agent. Returns whether it was registered.
    pub async fn deregister(&self, id: &str) -> bool {
        let mut agents = self.agents.write().await;
        let before = agents.len();
        agents.retain(|a| a.descriptor.id != id);
        let removed = agents.len() != before;
        if removed {
            self.health.write().await.remove(id);
            tracing::info!(agent = %id, "Deregistered agent");
        }
        removed
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Descriptors with last known health, in registration order
    pub async fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.snapshot()
            .await
            .into_iter()
            .map(|handle| handle.descriptor)
            .collect()
    }

    /// Handles with last known health, in registration order
    pub async fn snapshot(&self) -> Vec<AgentHandle> {
        let agents = self.agents.read().await;
        let health = self.health.read().await;
        agents
            .iter()
            .map(|handle| {
                let mut handle = handle.clone();
                handle.descriptor.health = health
                    .get(&handle.descriptor.id)
                    .copied()
                    .unwrap_or_default();
                handle
            })
            .collect()
    }

    /// Look up one agent
    pub async fn get(&self, id: &str) -> Option<AgentHandle> {
        self.snapshot()
            .await
            .into_iter()
            .find(|handle| handle.descriptor.id == id)
    }

    /// Last known health of every agent, without probing
    pub async fn health_snapshot(&self) -> BTreeMap<String, HealthState> {
        self.snapshot()
            .await
            .into_iter()
            .map(|handle| (handle.descriptor.id, handle.descriptor.health))
            .collect()
    }

    /// Probe every agent concurrently and record the results.
    ///
    /// Each probe is bounded by the probe timeout; a probe that errors or
    /// times out marks its agent `Unreachable`. Total latency is bounded by
    /// one probe timeout, not the sum.
    pub async fn check_health(&self) -> BTreeMap<String, HealthState> {
        let targets: Vec<(String, Arc<dyn AgentClient>)> = self
            .agents
            .read()
            .await
            .iter()
            .map(|a| (a.descriptor.id.clone(), a.client.clone()))
            .collect();

        let probe_timeout = self.probe_timeout;
        let probes = targets.into_iter().map(|(id, client)| async move {
            let state = match tokio::time::timeout(probe_timeout, client.probe()).await {
                Ok(Ok(state)) => state,
                Ok(Err(e)) => {
                    tracing::warn!(agent = %id, "Health probe failed: {}", e);
                    HealthState::Unreachable
                }
                Err(_) => {
                    tracing::warn!(
                        agent = %id,
                        "Health probe timed out after {}ms",
                        probe_timeout.as_millis()
                    );
                    HealthState::Unreachable
                }
            };
            (id, client, state)
        });
        let results: Vec<(String, Arc<dyn AgentClient>, HealthState)> = join_all(probes).await;

        // Agents removed or re-registered while probing are not written back
        let agents = self.agents.read().await;
        let mut health = self.health.write().await;
        let mut report = BTreeMap::new();
        for (id, client, state) in results {
            let current = agents
                .iter()
                .any(|a| a.descriptor.id == id && Arc::ptr_eq(&a.client, &client));
            if current {
                health.insert(id.clone(), state);
                if let Some(metrics) = &self.metrics {
                    metrics.record_health(&id, state);
                }
                report.insert(id, state);
            }
        }

        tracing::debug!(agents = report.len(), "Health check complete");
        report
    }
}
