//! Node legs that fail, stall or are unreachable.
//!
//! One party is a real kiosk node, the other a wiremock server (or a
//! closed port) standing in for a misbehaving frame.

use kiosk_test_utils::{TestKioskNode, TestRemoteController};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Node API base on a port nothing listens on.
async fn unreachable_api() -> Result<String, anyhow::Error> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}/api", addr))
}

async fn rc_post(
    rc: &TestRemoteController,
    party: &str,
    path: &str,
) -> Result<(u16, Value), anyhow::Error> {
    let response = reqwest::Client::new()
        .post(rc.party_url(party, path))
        .send()
        .await?;
    let status = response.status().as_u16();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn test_initiate_receive_failure_leaves_caller_ringing() -> Result<(), anyhow::Error> {
    let adam = TestKioskNode::spawn().await?;
    let steve = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/call/receive"))
        .respond_with(ResponseTemplate::new(500).set_body_string("frame is rebooting"))
        .expect(1)
        .mount(&steve)
        .await;

    let rc =
        TestRemoteController::spawn_with_urls(&adam.api_url(), &format!("{}/api", steve.uri()), &[])
            .await?;

    let (status, body) = rc_post(&rc, "adam", "/call/initiate").await?;

    assert_eq!(status, 200);
    assert_eq!(body["ok"], false);
    assert_eq!(body["self"]["ok"], true);
    assert_eq!(body["other"]["ok"], false);
    assert_eq!(
        body["other"]["error"],
        "Frame steve POST /call/receive failed: 500 frame is rebooting"
    );

    // No rollback: the caller is still ringing with the generated id.
    let state: Value = reqwest::get(format!("{}/call/state", adam.api_url()))
        .await?
        .json()
        .await?;
    assert_eq!(state["state"], "outgoing_ringing");
    assert_eq!(state["call"]["call_id"], body["call_id"]);
    Ok(())
}

#[tokio::test]
async fn test_initiate_on_unreachable_caller_is_502() -> Result<(), anyhow::Error> {
    let steve = TestKioskNode::spawn().await?;
    let rc = TestRemoteController::spawn_with_urls(&unreachable_api().await?, &steve.api_url(), &[])
        .await?;

    let (status, body) = rc_post(&rc, "adam", "/call/initiate").await?;

    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "UPSTREAM_FAILURE");
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("Frame adam POST /call/initiate failed:"));

    let state: Value = reqwest::get(format!("{}/call/state", steve.api_url()))
        .await?
        .json()
        .await?;
    assert_eq!(state["state"], "idle");
    Ok(())
}

#[tokio::test]
async fn test_status_reports_unreachable_reads_inline() -> Result<(), anyhow::Error> {
    let adam = TestKioskNode::spawn().await?;
    let rc = TestRemoteController::spawn_with_urls(&adam.api_url(), &unreachable_api().await?, &[])
        .await?;

    let response = reqwest::get(rc.party_url("adam", "/status")).await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;

    assert_eq!(body["self"]["call_state"], "idle");
    assert_eq!(body["self"]["volume"]["volume_percent"], 50);

    assert_eq!(body["other"]["volume"]["ok"], false);
    let error = body["other"]["volume"]["error"].as_str().unwrap_or_default();
    assert!(error.starts_with("other volume: Frame steve GET /volume failed:"));
    assert!(body["other"]["call_state"].is_null());
    assert_eq!(body["other"]["call_error"]["ok"], false);
    Ok(())
}

#[tokio::test]
async fn test_slow_node_times_out() -> Result<(), anyhow::Error> {
    let adam = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/call/state"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"state": "idle", "call": null}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&adam)
        .await;
    let steve = TestKioskNode::spawn().await?;

    let rc = TestRemoteController::spawn_with_urls(
        &format!("{}/api", adam.uri()),
        &steve.api_url(),
        &[("NODE_READ_TIMEOUT_SECONDS", "1")],
    )
    .await?;

    let (status, body) = rc_post(&rc, "adam", "/call/accept").await?;

    assert_eq!(status, 502);
    assert_eq!(
        body["error"]["message"],
        "Frame adam GET /call/state failed: request timed out"
    );
    Ok(())
}

#[tokio::test]
async fn test_end_with_both_nodes_unreachable_is_502() -> Result<(), anyhow::Error> {
    let rc = TestRemoteController::spawn_with_urls(
        &unreachable_api().await?,
        &unreachable_api().await?,
        &[],
    )
    .await?;

    let (status, body) = rc_post(&rc, "steve", "/call/end").await?;

    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "UPSTREAM_FAILURE");
    Ok(())
}

#[tokio::test]
async fn test_end_with_unreachable_caller_and_idle_callee_is_502() -> Result<(), anyhow::Error> {
    let steve = TestKioskNode::spawn().await?;
    let rc = TestRemoteController::spawn_with_urls(&unreachable_api().await?, &steve.api_url(), &[])
        .await?;

    let (status, body) = rc_post(&rc, "adam", "/call/end").await?;

    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "UPSTREAM_FAILURE");
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("Frame adam GET /call/state failed"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn test_reset_reports_failed_leg_inline() -> Result<(), anyhow::Error> {
    let adam = TestKioskNode::spawn().await?;
    let rc = TestRemoteController::spawn_with_urls(&adam.api_url(), &unreachable_api().await?, &[])
        .await?;

    let (status, body) = rc_post(&rc, "adam", "/call/reset").await?;

    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    assert_eq!(body["self"]["ok"], true);
    assert_eq!(body["other"]["ok"], false);
    Ok(())
}

#[tokio::test]
async fn test_access_headers_sent_when_configured() -> Result<(), anyhow::Error> {
    let adam = TestKioskNode::spawn().await?;
    let steve = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/volume/mute"))
        .and(header("CF-Access-Client-Id", "steve-id"))
        .and(header("CF-Access-Client-Secret", "steve-secret"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "ok": true,
            "volume_percent": 30,
            "muted": true
        })))
        .expect(1)
        .mount(&steve)
        .await;

    let rc = TestRemoteController::spawn_with_urls(
        &adam.api_url(),
        &format!("{}/api", steve.uri()),
        &[
            ("STEVE_ACCESS_CLIENT_ID", "steve-id"),
            ("STEVE_ACCESS_CLIENT_SECRET", "steve-secret"),
        ],
    )
    .await?;

    let (status, body) = rc_post(&rc, "adam", "/volume/mute").await?;

    assert_eq!(status, 200);
    assert_eq!(body, json!({"ok": true, "volume_percent": 30, "muted": true}));

    let health: Value = reqwest::get(format!("{}/api/health", rc.url()))
        .await?
        .json()
        .await?;
    assert_eq!(health["access_tokens_configured"]["steve"], true);
    assert_eq!(health["access_tokens_configured"]["adam"], false);
    Ok(())
}

#[tokio::test]
async fn test_node_contract_violation_is_502() -> Result<(), anyhow::Error> {
    let adam = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/volume"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&adam)
        .await;
    let steve = TestKioskNode::spawn().await?;

    let rc = TestRemoteController::spawn_with_urls(&format!("{}/api", adam.uri()), &steve.api_url(), &[])
        .await?;

    let body: Value = reqwest::get(rc.party_url("steve", "/status"))
        .await?
        .json()
        .await?;

    let error = body["other"]["volume"]["error"].as_str().unwrap_or_default();
    assert!(error.starts_with("other volume: Frame adam GET /volume failed: invalid response body"));
    Ok(())
}
