//! Call state machine HTTP tests.
//!
//! Exercises `/api/call/*` on real nodes spawned with `TestKioskNode`.

use kiosk_test_utils::TestKioskNode;
use serde_json::{json, Value};

async fn post(
    client: &reqwest::Client,
    node: &TestKioskNode,
    action: &str,
    call_id: &str,
) -> Result<(u16, Value), anyhow::Error> {
    let response = client
        .post(format!("{}/call/{}", node.api_url(), action))
        .json(&json!({ "call_id": call_id }))
        .send()
        .await?;
    let status = response.status().as_u16();
    let body: Value = response.json().await?;
    Ok((status, body))
}

async fn call_state(client: &reqwest::Client, node: &TestKioskNode) -> Result<Value, anyhow::Error> {
    Ok(client
        .get(format!("{}/call/state", node.api_url()))
        .send()
        .await?
        .json()
        .await?)
}

#[tokio::test]
async fn test_two_node_call_lifecycle() -> Result<(), anyhow::Error> {
    let a = TestKioskNode::spawn().await?;
    let b = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, &a, "initiate", "call-1").await?;
    assert_eq!(status, 202);
    assert_eq!(body["ok"], true);
    assert_eq!(body["call"]["state"], "outgoing_ringing");

    let (status, body) = post(&client, &b, "receive", "call-1").await?;
    assert_eq!(status, 202);
    assert_eq!(body["call"]["state"], "incoming_ringing");

    let (status, body) = post(&client, &b, "accept", "call-1").await?;
    assert_eq!(status, 202);
    assert_eq!(body["call"]["state"], "connecting");
    assert_eq!(call_state(&client, &b).await?["state"], "connecting");

    let (status, body) = post(&client, &b, "accept", "call-2").await?;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(call_state(&client, &b).await?["state"], "connecting");

    let (status, body) = post(&client, &a, "end", "call-1").await?;
    assert_eq!(status, 202);
    assert_eq!(body, json!({"ok": true}));
    let (status, _) = post(&client, &b, "end", "call-1").await?;
    assert_eq!(status, 202);

    for node in [&a, &b] {
        let state = call_state(&client, node).await?;
        assert_eq!(state["state"], "idle");
        assert!(state["call"].is_null());
    }

    Ok(())
}

#[tokio::test]
async fn test_busy_node_rejects_second_call() -> Result<(), anyhow::Error> {
    let node = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    post(&client, &node, "initiate", "call-1").await?;

    let (status, body) = post(&client, &node, "receive", "call-2").await?;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = post(&client, &node, "initiate", "call-2").await?;
    assert_eq!(status, 409);

    let state = call_state(&client, &node).await?;
    assert_eq!(state["call"]["call_id"], "call-1");
    assert_eq!(state["state"], "outgoing_ringing");
    Ok(())
}

#[tokio::test]
async fn test_accept_requires_incoming_ringing() -> Result<(), anyhow::Error> {
    let node = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    let (status, _) = post(&client, &node, "accept", "call-1").await?;
    assert_eq!(status, 404);

    post(&client, &node, "initiate", "call-1").await?;
    let (status, body) = post(&client, &node, "accept", "call-1").await?;
    assert_eq!(status, 409);
    assert_eq!(
        body["error"]["message"],
        "Cannot accept from state=outgoing_ringing"
    );
    assert_eq!(call_state(&client, &node).await?["state"], "outgoing_ringing");
    Ok(())
}

#[tokio::test]
async fn test_decline_then_end_again_is_not_found() -> Result<(), anyhow::Error> {
    let node = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    post(&client, &node, "receive", "call-1").await?;
    let (status, body) = post(&client, &node, "decline", "call-1").await?;
    assert_eq!(status, 202);
    assert!(body.get("call").is_none());
    assert_eq!(call_state(&client, &node).await?["state"], "idle");

    let (status, _) = post(&client, &node, "end", "call-1").await?;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn test_reset_accepts_missing_body() -> Result<(), anyhow::Error> {
    let node = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    post(&client, &node, "initiate", "call-1").await?;

    let response = client
        .post(format!("{}/call/reset", node.api_url()))
        .send()
        .await?;
    assert_eq!(response.status(), 202);
    assert_eq!(response.json::<Value>().await?, json!({"ok": true}));

    assert_eq!(call_state(&client, &node).await?["state"], "idle");
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() -> Result<(), anyhow::Error> {
    let node = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/call/initiate", node.api_url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let response = client
        .post(format!("{}/call/initiate", node.api_url()))
        .json(&json!({ "id": "call-1" }))
        .send()
        .await?;
    assert_eq!(response.status(), 400);

    let (status, _) = post(&client, &node, "initiate", "").await?;
    assert_eq!(status, 400);

    assert_eq!(call_state(&client, &node).await?["state"], "idle");
    Ok(())
}

#[tokio::test]
async fn test_health_reports_call_state() -> Result<(), anyhow::Error> {
    let node = TestKioskNode::spawn().await?;
    let client = reqwest::Client::new();

    post(&client, &node, "receive", "call-1").await?;

    let body: Value = client
        .get(format!("{}/health", node.url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["call_state"], "incoming_ringing");
    Ok(())
}
