use super::common;

use common::test_server::{a2a_agent, fake_agent, TestServer};

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::host(vec![]).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].is_number());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_health_ready_endpoint() {
    let empty = TestServer::host(vec![]).await;
    let agent = TestServer::start(fake_agent("advisor", "ok")).await;
    let ready = TestServer::host(vec![a2a_agent("advisor", &agent.base_url, &[])]).await;
    let client = reqwest::Client::new();

    let response = client.get(empty.url("/health/ready")).send().await.unwrap();
    assert_eq!(response.status(), 503);

    let response = client.get(ready.url("/health/ready")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_health_live_endpoint() {
    let server = TestServer::host(vec![]).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/health/live")).send().await.unwrap();

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_agents_status_probes_agents() {
    let healthy = TestServer::start(fake_agent("advisor", "ok")).await;
    let degraded = TestServer::start(fake_agent("search", "degraded")).await;
    let server = TestServer::host(vec![
        a2a_agent("advisor", &healthy.base_url, &["text"]),
        a2a_agent("search", &degraded.base_url, &["image"]),
        a2a_agent("gone", "http://127.0.0.1:9", &[]),
    ])
    .await;
    let client = reqwest::Client::new();

    // Nothing probed yet
    let body: serde_json::Value = client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["checks"]["agent_health"]["advisor"], "unknown");

    let body: serde_json::Value = client
        .get(server.url("/agents/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "success");
    assert_eq!(body["total"], 3);
    assert_eq!(body["agents"][0]["id"], "advisor");
    assert_eq!(body["agents"][0]["health"], "healthy");
    assert_eq!(body["agents"][1]["health"], "degraded");
    assert_eq!(body["agents"][2]["health"], "unreachable");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::host(vec![]).await;
    let client = reqwest::Client::new();

    // Generate a routed request first
    client.get(server.url("/health/live")).send().await.unwrap();

    let response = client.get(server.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("host_agent_requests_total"));
    assert!(body.contains("endpoint=\"/health/live\""));
}
