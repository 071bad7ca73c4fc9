use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{DispatchStatus, HealthState};

pub struct MetricsCollector {
    registry: Registry,

    // Request metrics
    pub requests_total: CounterVec,
    pub requests_in_flight: Gauge,

    // Dispatch metrics
    pub dispatches_total: CounterVec,
    pub dispatch_duration: HistogramVec,

    // Agent metrics
    pub agent_health: GaugeVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Request metrics
        let requests_total = CounterVec::new(
            Opts::new("host_agent_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let requests_in_flight = Gauge::new(
            "host_agent_requests_in_flight",
            "Number of chat requests currently being dispatched",
        )?;
        registry.register(Box::new(requests_in_flight.clone()))?;

        // Dispatch metrics
        let dispatches_total = CounterVec::new(
            Opts::new("host_agent_dispatches_total", "Total dispatched messages"),
            &["agent", "status"],
        )?;
        registry.register(Box::new(dispatches_total.clone()))?;

        let dispatch_duration = HistogramVec::new(
            HistogramOpts::new(
                "host_agent_dispatch_duration_seconds",
                "Time from receiving a message to its outcome",
            ),
            &["agent"],
        )?;
        registry.register(Box::new(dispatch_duration.clone()))?;

        // Agent metrics
        let agent_health = GaugeVec::new(
            Opts::new(
                "host_agent_agent_health",
                "Last probed agent health (0 healthy, 1 unknown, 2 degraded, 3 unreachable)",
            ),
            &["agent"],
        )?;
        registry.register(Box::new(agent_health.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_in_flight,
            dispatches_total,
            dispatch_duration,
            agent_health,
        })
    }

    pub fn record_dispatch(&self, agent: &str, status: DispatchStatus, elapsed: Duration) {
        let status = status.to_string();
        self.dispatches_total
            .with_label_values(&[agent, status.as_str()])
            .inc();
        self.dispatch_duration
            .with_label_values(&[agent])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_health(&self, agent: &str, state: HealthState) {
        self.agent_health
            .with_label_values(&[agent])
            .set(f64::from(state.rank()));
    }

    /// Count a chat request as in flight until the guard is dropped
    pub fn in_flight(&self) -> InFlightGuard {
        self.requests_in_flight.inc();
        InFlightGuard {
            gauge: self.requests_in_flight.clone(),
        }
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Decrements `requests_in_flight` on drop, including when the request is cancelled
pub struct InFlightGuard {
    gauge: Gauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

pub struct MetricsHandler {
    collector: Arc<MetricsCollector>,
}

impl MetricsHandler {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub async fn metrics(&self) -> String {
        self.collector.encode().unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::from("# Error encoding metrics\n")
        })
    }
}

/// Count every routed request by method, route and status
pub async fn track_requests(
    State(collector): State<Arc<MetricsCollector>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    collector
        .requests_total
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    response
}
