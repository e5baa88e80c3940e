mod common;
use common::{app_with, SpyGateway};

use serde_json::{json, Value};
use testrail_mcp::mcp::{http, server::McpServer};

async fn spawn() -> String {
    let server = McpServer::new(app_with(SpyGateway::replying(Ok(json!([]))), None));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, http::router(server)).await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn initialize_over_http_opens_a_session() {
    let base = spawn().await;
    let response = reqwest::Client::new()
        .post(format!("{}/mcp", base))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 200);
    let session = response
        .headers()
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("session header");
    assert!(uuid::Uuid::parse_str(&session).is_ok());
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["result"]["serverInfo"]["name"], "testrail-mcp-server");
}

#[tokio::test]
async fn notifications_are_accepted_without_body() {
    let base = spawn().await;
    let response = reqwest::Client::new()
        .post(format!("{}/mcp", base))
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 202);
    assert!(response.text().await.expect("body").is_empty());
}

#[tokio::test]
async fn tool_calls_over_http_use_the_same_envelope() {
    let base = spawn().await;
    let response = reqwest::Client::new()
        .post(format!("{}/mcp", base))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": "a",
            "method": "tools/call",
            "params": {"name": "get_statuses", "arguments": {}},
        }))
        .send()
        .await
        .expect("send");
    assert!(response.headers().get("mcp-session-id").is_none());
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["id"], "a");
    assert_eq!(body["result"]["content"][0]["type"], "text");
}

#[tokio::test]
async fn health_endpoints_report_status() {
    let base = spawn().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("send")
        .json()
        .await
        .expect("json");
    assert_eq!(health["status"], "healthy");
    assert!(health["uptime"].as_f64().is_some());
    assert!(health["timestamp"].is_string());

    let ready: Value = client
        .get(format!("{}/health/ready", base))
        .send()
        .await
        .expect("send")
        .json()
        .await
        .expect("json");
    assert_eq!(ready["ready"], true);
}
