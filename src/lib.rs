//! # Host Agent - multi-agent orchestration core
//!
//! Host Agent receives chat messages (optionally with file attachments),
//! picks the most suitable downstream agent, forwards the message with
//! recent conversation context, and records the exchange per session.
//!
//! ## Features
//!
//! - **Routing**: `@agent` hints, attachment categories and capability keywords
//! - **Sessions**: per-session chat history with per-key locking
//! - **Health**: concurrent, time-bounded agent probes with a background refresh
//! - **Failures as values**: agent errors become structured dispatch results
//! - **Metrics**: Prometheus metrics for monitoring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use host_agent::agents::{AgentRegistry, MockAgentClient};
//! use host_agent::domain::AgentDescriptor;
//! use host_agent::orchestration::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(AgentRegistry::default());
//!     registry
//!         .register(AgentDescriptor::new("echo", "mock://echo"), Arc::new(MockAgentClient::echo()))
//!         .await;
//!
//!     let orchestrator = Orchestrator::in_memory(registry);
//!     let result = orchestrator.process_message("hello", None, None).await?;
//!     println!("{}: {}", result.status, result.response);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Host Agent follows Hexagonal Architecture:
//! - **Domain**: messages, attachments, agent descriptors, dispatch results
//! - **Agents**: the agent client port, its transports, and the registry
//! - **Session**: the session store port and its in-memory adapter
//! - **Orchestration**: routing policy, dispatcher and facade
//! - **Adapters**: HTTP handlers, health and metrics
//! - **Config**: configuration management

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod orchestration;
pub mod session;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::health_handler::HealthHandler;
use crate::adapters::metrics_handler::{self, MetricsCollector, MetricsHandler};
use crate::orchestration::Orchestrator;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Largest accepted multipart chat upload
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `orchestrator` - Facade every API endpoint delegates to
/// * `metrics` - Prometheus collector shared with the orchestrator
///
/// # Returns
///
/// Configured Axum Router
pub fn create_app(orchestrator: Arc<Orchestrator>, metrics: Arc<MetricsCollector>) -> Router {
    let health_handler = Arc::new(HealthHandler::new(orchestrator.registry().clone()));
    let metrics_handler = Arc::new(MetricsHandler::new(metrics.clone()));

    // Health check and metrics endpoints
    let ops_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }))
        .route("/metrics", get({
            let handler = metrics_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.metrics().await }
            }
        }));

    let api_state = ApiState {
        orchestrator,
        metrics: metrics.clone(),
    };

    // Chat, agent and session endpoints
    let api_router = Router::new()
        .route("/", get(api_handler::root))
        .route(
            "/chat",
            post(api_handler::chat).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/agents/status", get(api_handler::agents_status))
        .route("/sessions", get(api_handler::list_sessions))
        .route("/sessions/create", post(api_handler::create_session))
        .route("/sessions/:session_id", delete(api_handler::delete_session))
        .route(
            "/sessions/:session_id/history",
            get(api_handler::get_history).delete(api_handler::clear_history),
        )
        .route("/users/:user_id/sessions", get(api_handler::user_sessions))
        .with_state(api_state);

    ops_router
        .merge(api_router)
        .route_layer(axum::middleware::from_fn_with_state(
            metrics,
            metrics_handler::track_requests,
        ))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}
