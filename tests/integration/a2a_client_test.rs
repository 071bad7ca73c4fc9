use super::common;

use common::test_server::{fake_agent, TestServer};
use host_agent::agents::{A2aClient, AgentClient, AgentFailure, AgentRequest, SessionContext};
use host_agent::domain::{Attachment, HealthState, Message};
use std::time::Duration;

fn request(message: &str) -> AgentRequest {
    AgentRequest {
        message: message.to_string(),
        context: SessionContext {
            session_id: "s1".to_string(),
            user_id: None,
            history: vec![Message::user("earlier"), Message::agent("advisor", "reply")],
        },
        attachments: vec![],
    }
}

#[tokio::test]
async fn test_send_success() {
    let agent = TestServer::start(fake_agent("advisor", "ok")).await;
    let client = A2aClient::new("advisor", &agent.base_url, Duration::from_secs(2));

    let mut req = request("find me glasses");
    req.attachments = vec![Attachment::from_upload(b"img", Some("a.png"), Some("image/png")).unwrap()];
    let response = client.send(req).await.unwrap();

    assert_eq!(response.response, "advisor got: find me glasses");
    assert_eq!(response.analysis.as_deref(), Some("1 attachment(s)"));
    let data = response.data.unwrap();
    assert_eq!(data["history"], 2);
    assert_eq!(data["attachments"], 1);
}

#[tokio::test]
async fn test_send_rejected() {
    let agent = TestServer::start(fake_agent("advisor", "ok")).await;
    let client = A2aClient::new("advisor", &agent.base_url, Duration::from_secs(2));

    let failure = client.send(request("please reject this")).await.unwrap_err();
    assert_eq!(failure, AgentFailure::Rejected("not something I do".to_string()));
}

#[tokio::test]
async fn test_send_server_error_is_protocol_error() {
    let agent = TestServer::start(fake_agent("advisor", "ok")).await;
    let client = A2aClient::new("advisor", &agent.base_url, Duration::from_secs(2));

    let failure = client.send(request("broken input")).await.unwrap_err();
    assert!(matches!(failure, AgentFailure::ProtocolError(msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_send_missing_response_field() {
    let agent = TestServer::start(fake_agent("advisor", "ok")).await;
    let client = A2aClient::new("advisor", &agent.base_url, Duration::from_secs(2));

    let failure = client.send(request("garbled")).await.unwrap_err();
    assert!(matches!(failure, AgentFailure::ProtocolError(_)));
}

#[tokio::test]
async fn test_send_timeout() {
    let agent = TestServer::start(fake_agent("advisor", "ok")).await;
    let client = A2aClient::new("advisor", &agent.base_url, Duration::from_millis(200));

    let failure = client.send(request("slow please")).await.unwrap_err();
    assert_eq!(failure, AgentFailure::Timeout(200));
}

#[tokio::test]
async fn test_send_connection_refused_is_retryable() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = A2aClient::new("gone", format!("http://{}", addr), Duration::from_secs(1));
    let failure = client.send(request("hello")).await.unwrap_err();
    assert!(matches!(failure, AgentFailure::Unreachable { .. }));
    assert!(failure.is_retryable());
}

#[tokio::test]
async fn test_probe() {
    let healthy = TestServer::start(fake_agent("a", "ok")).await;
    let degraded = TestServer::start(fake_agent("b", "degraded")).await;

    let client = A2aClient::new("a", &healthy.base_url, Duration::from_secs(1));
    assert_eq!(client.probe().await.unwrap(), HealthState::Healthy);

    let client = A2aClient::new("b", &degraded.base_url, Duration::from_secs(1));
    assert_eq!(client.probe().await.unwrap(), HealthState::Degraded);
}
