use super::common;

use common::test_server::{a2a_agent, fake_agent, TestServer};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

async fn post_chat(client: &reqwest::Client, server: &TestServer, form: Form) -> (u16, Value) {
    let response = client
        .post(server.url("/chat"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_chat_routes_image_to_vision_agent() {
    let advisor = TestServer::start(fake_agent("advisor", "ok")).await;
    let vision = TestServer::start(fake_agent("vision", "ok")).await;
    let server = TestServer::host(vec![
        a2a_agent("advisor", &advisor.base_url, &["text"]),
        a2a_agent("vision", &vision.base_url, &["image"]),
    ])
    .await;
    let client = reqwest::Client::new();

    let image = Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name("frames.png")
        .mime_str("image/png")
        .unwrap();
    let form = Form::new()
        .text("message", "describe this")
        .text("user_id", "alice")
        .part("files", image);

    let (status, body) = post_chat(&client, &server, form).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["agent_used"], "vision");
    assert_eq!(body["response"], "vision got: describe this");
    assert_eq!(body["data"]["attachments"], 1);

    // The generated session now holds the exchange
    let session_id = body["session_id"].as_str().unwrap().to_string();
    let history: Value = client
        .get(server.url(&format!("/sessions/{}/history?user_id=alice", session_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["total_messages"], 2);
    assert_eq!(history["messages"][0]["metadata"]["attachments"][0], "frames.png");
}

#[tokio::test]
async fn test_chat_forwards_context() {
    let advisor = TestServer::start(fake_agent("advisor", "ok")).await;
    let server = TestServer::host(vec![a2a_agent("advisor", &advisor.base_url, &[])]).await;
    let client = reqwest::Client::new();

    for expected_history in [0, 2, 4] {
        let form = Form::new()
            .text("message", "more please")
            .text("session_id", "conversation-1");
        let (status, body) = post_chat(&client, &server, form).await;
        assert_eq!(status, 200);
        assert_eq!(body["session_id"], "conversation-1");
        assert_eq!(body["data"]["history"], expected_history);
    }
}

#[tokio::test]
async fn test_chat_agent_failures_are_structured() {
    let advisor = TestServer::start(fake_agent("advisor", "ok")).await;
    let server = TestServer::host(vec![a2a_agent("advisor", &advisor.base_url, &[])]).await;
    let client = reqwest::Client::new();

    let form = Form::new().text("message", "please reject this");
    let (status, body) = post_chat(&client, &server, form).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "failure");
    assert_eq!(body["agent_used"], "advisor");
    assert_eq!(body["error"]["kind"], "agent_rejected");

    let form = Form::new().text("message", "slow answer").text("session_id", "s-timeout");
    let (status, body) = post_chat(&client, &server, form).await;
    assert_eq!(status, 200);
    assert_eq!(body["error"]["kind"], "agent_timeout");

    let history: Value = client
        .get(server.url("/sessions/s-timeout/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["total_messages"], 1);
    assert_eq!(history["messages"][0]["role"], "user");
}

#[tokio::test]
async fn test_chat_without_agents() {
    let server = TestServer::host(vec![]).await;
    let client = reqwest::Client::new();

    let (status, body) = post_chat(&client, &server, Form::new().text("message", "anyone?")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "no_handler");
    assert!(body["agent_used"].is_null());
}
