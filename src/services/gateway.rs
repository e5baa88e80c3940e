use crate::constants::upstream::ATTACHMENT_FIELD;
use crate::errors::ToolError;
use crate::mcp::catalog::HttpMethod;
use crate::services::credentials::{CredentialSource, UpstreamSettings};
use crate::services::logger::Logger;
use crate::services::request_builder::UpstreamRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// The single seam to the upstream API.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send one request and return the decoded payload.
    async fn send(&self, request: &UpstreamRequest) -> Result<Value, ToolError>;

    /// POST a local file as `multipart/form-data` to `endpoint`.
    async fn upload_attachment(&self, endpoint: &str, file: &Path) -> Result<Value, ToolError>;
}

struct Session {
    settings: UpstreamSettings,
    client: Client,
}

/// `Gateway` over HTTP with basic auth. Credentials are resolved on first
/// use; a failed resolution is retried on the next call.
pub struct HttpGateway {
    logger: Logger,
    source: CredentialSource,
    session: OnceCell<Session>,
}

impl HttpGateway {
    pub fn new(logger: Logger, source: CredentialSource) -> Self {
        Self {
            logger: logger.child("gateway"),
            source,
            session: OnceCell::new(),
        }
    }

    pub fn from_settings(logger: Logger, settings: UpstreamSettings) -> Self {
        Self::new(logger, CredentialSource::Static(settings))
    }

    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }

    async fn session(&self) -> Result<&Session, ToolError> {
        self.session
            .get_or_try_init(|| async {
                let settings = self.source.resolve()?;
                let mut builder = Client::builder();
                if let Some(timeout_ms) = settings.timeout_ms {
                    builder = builder.timeout(Duration::from_millis(timeout_ms));
                }
                let client = builder.build().map_err(|err| {
                    ToolError::internal(format!("Failed to build HTTP client: {}", err))
                })?;
                let auth = if settings.api_key.is_some() {
                    "api_key"
                } else {
                    "password"
                };
                self.logger.info(
                    "Upstream client ready",
                    Some(&serde_json::json!({
                        "base_url": settings.base_url.as_str(),
                        "username": settings.username,
                        "auth": auth,
                    })),
                );
                Ok::<Session, ToolError>(Session { settings, client })
            })
            .await
    }

    async fn finish(
        &self,
        method: &str,
        endpoint: &str,
        started: Instant,
        response: reqwest::Response,
    ) -> Result<Value, ToolError> {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let body = decode_body(&bytes);

        let meta = serde_json::json!({
            "method": method,
            "endpoint": endpoint,
            "status": status.as_u16(),
            "duration_ms": started.elapsed().as_millis() as u64,
        });
        if status.is_success() {
            self.logger.debug("Upstream call completed", Some(&meta));
            Ok(body)
        } else {
            self.logger.warn("Upstream call failed", Some(&meta));
            let body = if body.is_null() { None } else { Some(body) };
            Err(ToolError::upstream_http(status.as_u16(), &reason, body))
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(&self, request: &UpstreamRequest) -> Result<Value, ToolError> {
        if let Some(file) = request.attachment.as_deref() {
            return self.upload_attachment(&request.endpoint(), file).await;
        }

        let session = self.session().await?;
        let endpoint = request.endpoint();
        let url = session.settings.endpoint_url(&endpoint);

        let mut req = match request.method {
            HttpMethod::Get => session.client.get(url),
            HttpMethod::Post => session.client.post(url),
        };
        req = req
            .basic_auth(&session.settings.username, Some(session.settings.secret()))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &request.body {
            req = req.json(body);
        } else {
            req = req.header(reqwest::header::CONTENT_TYPE, "application/json");
        }

        self.logger.debug(
            "Sending upstream request",
            Some(&serde_json::json!({"method": request.method.as_str(), "endpoint": endpoint})),
        );
        let started = Instant::now();
        let response = req.send().await.map_err(map_reqwest_error)?;
        self.finish(request.method.as_str(), &endpoint, started, response)
            .await
    }

    async fn upload_attachment(&self, endpoint: &str, file: &Path) -> Result<Value, ToolError> {
        let bytes = tokio::fs::read(file).await.map_err(|err| {
            ToolError::invalid_argument(format!(
                "Cannot read attachment '{}': {}",
                file.display(),
                err
            ))
        })?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| ATTACHMENT_FIELD.to_string());

        let session = self.session().await?;
        let url = session.settings.endpoint_url(endpoint);
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part(ATTACHMENT_FIELD, part);

        self.logger.debug(
            "Uploading attachment",
            Some(&serde_json::json!({"endpoint": endpoint, "file": file.display().to_string()})),
        );
        let started = Instant::now();
        let response = session
            .client
            .post(url)
            .basic_auth(&session.settings.username, Some(session.settings.secret()))
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.finish("POST", endpoint, started, response).await
    }
}

/// JSON when it parses, `null` when empty, the raw text otherwise.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        return ToolError::upstream_transport(format!("TestRail request timed out: {}", err));
    }
    ToolError::upstream_transport(format!("TestRail request failed: {}", err))
}
