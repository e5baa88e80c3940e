mod common;
use common::{app_with, SpyGateway};

use serde_json::{json, Value};
use testrail_mcp::mcp::server::McpServer;

fn server() -> McpServer {
    McpServer::new(app_with(SpyGateway::replying(Ok(json!({"ok": true}))), None))
}

async fn serve_lines(server: &McpServer, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve");
    String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[tokio::test]
async fn initialize_reports_server_identity() {
    let responses = serve_lines(
        &server(),
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n",
    )
    .await;
    assert_eq!(responses.len(), 1);
    let result = &responses[0]["result"];
    assert_eq!(result["serverInfo"]["name"], "testrail-mcp-server");
    assert_eq!(result["protocolVersion"], "2025-06-18");
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn tools_list_exposes_schemas() {
    let responses = serve_lines(
        &server(),
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
    )
    .await;
    let tools = responses[0]["result"]["tools"].as_array().expect("tools");
    let get_case = tools
        .iter()
        .find(|t| t["name"] == "get_case")
        .expect("get_case listed");
    assert_eq!(get_case["inputSchema"]["type"], "object");
    assert_eq!(get_case["inputSchema"]["required"], json!(["case_id"]));
    assert!(!get_case["description"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn notifications_and_blank_lines_get_no_reply() {
    let input = concat!(
        "\n",
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n",
    );
    let responses = serve_lines(&server(), input).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 3);
    assert_eq!(responses[0]["result"], json!({}));
}

#[tokio::test]
async fn malformed_lines_get_json_rpc_errors() {
    let input = concat!(
        "{not json\n",
        "{\"jsonrpc\":\"2.0\",\"id\":4}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"resources/list\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":6,\"method\":\"tools/call\",\"params\":{}}\n",
    );
    let responses = serve_lines(&server(), input).await;
    let codes: Vec<i64> = responses
        .iter()
        .map(|r| r["error"]["code"].as_i64().unwrap_or_default())
        .collect();
    assert_eq!(codes, vec![-32700, -32600, -32601, -32602]);
    assert_eq!(responses[1]["id"], 4);
}

#[tokio::test]
async fn tools_call_without_arguments_treats_them_as_empty() {
    let responses = serve_lines(
        &server(),
        "{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"tools/call\",\"params\":{\"name\":\"get_projects\"}}\n",
    )
    .await;
    let result = &responses[0]["result"];
    assert!(result.get("isError").is_none());
    let text = result["content"][0]["text"].as_str().expect("text");
    assert_eq!(serde_json::from_str::<Value>(text).expect("json"), json!({"ok": true}));
}
