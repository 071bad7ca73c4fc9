//! Periodic health refresh

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::AgentRegistry;
use crate::domain::HealthState;

/// Background task that re-probes every agent on a fixed interval
pub struct HealthMonitor {
    registry: Arc<AgentRegistry>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<AgentRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Start refreshing. Abort the returned handle to stop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = self.registry.check_health().await;
                let unhealthy = report
                    .values()
                    .filter(|s| **s == HealthState::Unreachable)
                    .count();
                tracing::debug!(
                    agents = report.len(),
                    unreachable = unhealthy,
                    "Refreshed agent health"
                );
            }
        })
    }
}
