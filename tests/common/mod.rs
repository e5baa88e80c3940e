#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use testrail_mcp::app::App;
use testrail_mcp::errors::ToolError;
use testrail_mcp::services::gateway::Gateway;
use testrail_mcp::services::logger::{LogLevel, Logger};
use testrail_mcp::services::request_builder::UpstreamRequest;
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const CREDENTIAL_VARS: [&str; 5] = [
    "TESTRAIL_URL",
    "TESTRAIL_USERNAME",
    "TESTRAIL_PASSWORD",
    "TESTRAIL_APIKEY",
    "TESTRAIL_TIMEOUT_MS",
];

pub fn quiet_logger() -> Logger {
    Logger::new("test").with_level(LogLevel::Error)
}

/// Snapshot of env vars, restored on drop.
pub struct EnvSnapshot {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvSnapshot {
    pub fn take(keys: &[&'static str]) -> Self {
        Self {
            saved: keys.iter().map(|k| (*k, std::env::var(k).ok())).collect(),
        }
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    /// Path and query exactly as received, e.g. `/index.php?/api/v2/get_case/7`.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn json_body(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Clone)]
struct UpstreamState {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    seen: Arc<StdMutex<Vec<Captured>>>,
}

/// Fake TestRail instance answering every request with one canned reply.
pub struct FakeUpstream {
    pub base_url: String,
    seen: Arc<StdMutex<Vec<Captured>>>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start(status: u16, body: &'static str) -> Self {
        Self::start_delayed(status, body, Duration::ZERO).await
    }

    /// Like `start`, but every reply is held back for `delay`.
    pub async fn start_delayed(status: u16, body: &'static str, delay: Duration) -> Self {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let state = UpstreamState {
            status: StatusCode::from_u16(status).expect("valid status"),
            body,
            delay,
            seen: seen.clone(),
        };
        let app = Router::new().fallback(record).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().expect("local addr");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base_url: format!("http://{}", addr),
            seen,
            task,
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.seen.lock().expect("lock").clone()
    }

    pub fn only_request(&self) -> Captured {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        requests[0].clone()
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record(
    State(state): State<UpstreamState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    state.seen.lock().expect("lock").push(Captured {
        method,
        target,
        headers,
        body,
    });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (
        state.status,
        [("content-type", "application/json")],
        state.body,
    )
        .into_response()
}

/// Gateway double that records requests and answers with a fixed reply.
pub struct SpyGateway {
    calls: StdMutex<Vec<UpstreamRequest>>,
    uploads: StdMutex<Vec<(String, PathBuf)>>,
    reply: Result<Value, ToolError>,
}

impl SpyGateway {
    pub fn replying(reply: Result<Value, ToolError>) -> Arc<Self> {
        Arc::new(Self {
            calls: StdMutex::new(Vec::new()),
            uploads: StdMutex::new(Vec::new()),
            reply,
        })
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.uploads.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Gateway for SpyGateway {
    async fn send(&self, request: &UpstreamRequest) -> Result<Value, ToolError> {
        self.calls.lock().expect("lock").push(request.clone());
        self.reply.clone()
    }

    async fn upload_attachment(&self, endpoint: &str, file: &Path) -> Result<Value, ToolError> {
        self.uploads
            .lock()
            .expect("lock")
            .push((endpoint.to_string(), file.to_path_buf()));
        self.reply.clone()
    }
}

pub fn app_with(gateway: Arc<dyn Gateway>, allow_list: Option<&[String]>) -> Arc<App> {
    Arc::new(App::with_gateway(quiet_logger(), allow_list, gateway).expect("app"))
}
