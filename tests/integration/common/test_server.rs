use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use host_agent::adapters::metrics_handler::MetricsCollector;
use host_agent::agents::AgentConfig;
use host_agent::config::Settings;
use host_agent::orchestration::Orchestrator;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// An axum app served on a random loopback port for the duration of a test
pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            base_url: format!("http://{}", addr),
            handle,
        }
    }

    /// Host agent with the given downstream agents
    pub async fn host(agents: Vec<AgentConfig>) -> Self {
        let settings = Settings {
            agents,
            ..Default::default()
        };
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let orchestrator =
            Arc::new(Orchestrator::from_settings(&settings, Some(metrics.clone())).await);

        Self::start(host_agent::create_app(orchestrator, metrics)).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Config entry for an A2A agent served at `url`
pub fn a2a_agent(name: &str, url: &str, capabilities: &[&str]) -> AgentConfig {
    serde_json::from_value(json!({
        "name": name,
        "url": url,
        "capabilities": capabilities,
        "timeout_seconds": 1,
    }))
    .unwrap()
}

/// Downstream agent speaking the A2A protocol.
///
/// Messages containing `reject`, `broken`, `garbled` or `slow` trigger the
/// corresponding misbehaviour; anything else is answered normally. `/health`
/// reports `health_status`.
pub fn fake_agent(name: &'static str, health_status: &'static str) -> Router {
    Router::new()
        .route("/message", post(fake_message))
        .route(
            "/health",
            get(move || async move { Json(json!({ "status": health_status })) }),
        )
        .with_state(name)
}

async fn fake_message(State(name): State<&'static str>, Json(body): Json<Value>) -> impl IntoResponse {
    let message = body["message"].as_str().unwrap_or_default().to_string();

    if message.contains("reject") {
        return (
            StatusCode::OK,
            Json(json!({ "status": "rejected", "error": "not something I do" })),
        );
    }
    if message.contains("broken") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "agent crashed" })),
        );
    }
    if message.contains("garbled") {
        return (StatusCode::OK, Json(json!({ "unexpected": true })));
    }
    if message.contains("slow") {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    let history = body["context"]["history"].as_array().map_or(0, Vec::len);
    let attachments = body["attachments"].as_array().map_or(0, Vec::len);
    (
        StatusCode::OK,
        Json(json!({
            "response": format!("{} got: {}", name, message),
            "analysis": format!("{} attachment(s)", attachments),
            "data": { "history": history, "attachments": attachments },
        })),
    )
}
