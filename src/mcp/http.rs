use crate::constants::server::SESSION_HEADER;
use crate::errors::ToolError;
use crate::mcp::protocol::JsonRpcResponse;
use crate::mcp::server::McpServer;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header::CONTENT_TYPE, Response as HttpResponse, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

struct HttpState {
    server: McpServer,
    started: Instant,
}

pub fn router(server: McpServer) -> Router {
    let state = Arc::new(HttpState {
        server,
        started: Instant::now(),
    });
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .route("/health/ready", get(ready_handler))
        .with_state(state)
}

pub async fn serve(server: McpServer, bind: SocketAddr) -> Result<(), ToolError> {
    let logger = server.app().logger.child("http");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    logger.info(
        "Serving MCP over HTTP",
        Some(&serde_json::json!({
            "mcp": format!("http://{}/mcp", local_addr),
            "health": format!("http://{}/health", local_addr),
        })),
    );
    axum::serve(listener, router(server)).await?;
    Ok(())
}

async fn mcp_handler(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let raw = String::from_utf8_lossy(&body);
    let is_initialize = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|v| v.get("method").and_then(|m| m.as_str()).map(|m| m == "initialize"))
        .unwrap_or(false);

    let Some(response) = state.server.handle_message(&raw).await else {
        return empty_response(StatusCode::ACCEPTED);
    };
    let session = if is_initialize && response.error.is_none() {
        Some(uuid::Uuid::new_v4().to_string())
    } else {
        None
    };
    json_response(&response, session)
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime": state.started.elapsed().as_secs_f64(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ready_handler() -> Json<Value> {
    Json(serde_json::json!({
        "ready": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn json_response(response: &JsonRpcResponse, session: Option<String>) -> Response {
    let Ok(bytes) = serde_json::to_vec(response) else {
        return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
    };
    let mut builder = HttpResponse::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR))
}

fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
