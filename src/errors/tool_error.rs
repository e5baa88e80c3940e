use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    MissingCredentials,
    UnknownOperation,
    MissingArgument,
    InvalidArgument,
    UpstreamHttp,
    UpstreamTransport,
    Internal,
}

impl ToolErrorKind {
    /// Errors of this kind stop the process from serving any operation and are
    /// reported as protocol faults instead of failed tool results.
    pub fn is_fatal(self) -> bool {
        matches!(self, ToolErrorKind::MissingCredentials)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            status: None,
            body: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn missing_credentials(message: impl Into<String>) -> Self {
        Self::new(
            ToolErrorKind::MissingCredentials,
            "MISSING_CREDENTIALS",
            message,
        )
    }

    pub fn unknown_operation(name: &str) -> Self {
        Self::new(
            ToolErrorKind::UnknownOperation,
            "UNKNOWN_OPERATION",
            format!("Unknown tool: {}", name),
        )
    }

    pub fn missing_argument(operation: &str, argument: &str) -> Self {
        Self::new(
            ToolErrorKind::MissingArgument,
            "MISSING_ARGUMENT",
            format!(
                "Missing required argument '{}' for {}",
                argument, operation
            ),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArgument, "INVALID_ARGUMENT", message)
    }

    /// Non-2xx answer from the upstream API. The message keeps the
    /// `TestRail API Error: <status> <reason> - <body>` shape callers grep for.
    pub fn upstream_http(status: u16, reason: &str, body: Option<Value>) -> Self {
        let rendered = body
            .as_ref()
            .map(|b| serde_json::to_string(b).unwrap_or_default())
            .unwrap_or_else(|| "null".to_string());
        let mut err = Self::new(
            ToolErrorKind::UpstreamHttp,
            "UPSTREAM_HTTP",
            format!("TestRail API Error: {} {} - {}", status, reason, rendered),
        );
        err.status = Some(status);
        err.body = body;
        err
    }

    pub fn upstream_transport(message: impl Into<String>) -> Self {
        Self::new(
            ToolErrorKind::UpstreamTransport,
            "UPSTREAM_TRANSPORT",
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_http_message_carries_status_reason_and_body() {
        let err = ToolError::upstream_http(
            404,
            "Not Found",
            Some(serde_json::json!({"error": "Field :case_id is not a valid test case."})),
        );
        assert_eq!(err.kind, ToolErrorKind::UpstreamHttp);
        assert_eq!(err.status, Some(404));
        assert!(err.message.starts_with("TestRail API Error: 404 Not Found - "));
        assert!(err.message.contains("not a valid test case"));
    }

    #[test]
    fn only_missing_credentials_is_fatal() {
        assert!(ToolError::missing_credentials("x").kind.is_fatal());
        assert!(!ToolError::unknown_operation("x").kind.is_fatal());
        assert!(!ToolError::upstream_transport("x").kind.is_fatal());
    }
}
