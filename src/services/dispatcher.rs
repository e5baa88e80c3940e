use crate::constants::suggest::MAX_SUGGESTIONS;
use crate::errors::{ErrorCode, McpError, ToolError};
use crate::mcp::catalog::Catalog;
use crate::mcp::envelope::CallToolResult;
use crate::services::gateway::Gateway;
use crate::services::logger::Logger;
use crate::services::request_builder::build_request;
use crate::utils::suggest::suggest;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of one invocation. Every call ends in `Responded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Resolved,
    Built,
    Sent,
    Responded,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Resolved => "resolved",
            Stage::Built => "built",
            Stage::Sent => "sent",
            Stage::Responded => "responded",
            Stage::Failed => "failed",
        }
    }
}

pub struct Dispatcher {
    logger: Logger,
    catalog: Arc<Catalog>,
    gateway: Arc<dyn Gateway>,
}

impl Dispatcher {
    pub fn new(logger: Logger, catalog: Arc<Catalog>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            logger: logger.child("dispatcher"),
            catalog,
            gateway,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn stage(&self, name: &str, stage: Stage) {
        self.logger.debug(
            "Invocation stage",
            Some(&serde_json::json!({"tool": name, "stage": stage.as_str()})),
        );
    }

    /// Run one invocation to completion and return the raw upstream payload.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let started = Instant::now();
        self.stage(name, Stage::Received);
        match self.run(name, &args).await {
            Ok(payload) => {
                self.logger.debug(
                    "Invocation stage",
                    Some(&serde_json::json!({
                        "tool": name,
                        "stage": Stage::Responded.as_str(),
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                Ok(payload)
            }
            Err(err) => {
                self.logger.warn(
                    "Invocation failed",
                    Some(&serde_json::json!({
                        "tool": name,
                        "stage": Stage::Failed.as_str(),
                        "kind": err.kind,
                        "status": err.status,
                        "message": err.message,
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                Err(err)
            }
        }
    }

    async fn run(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        let op = self
            .catalog
            .find_operation(name)
            .ok_or_else(|| self.unknown_operation(name))?;
        self.stage(name, Stage::Resolved);

        let args = match args {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => args.clone(),
            _ => {
                return Err(ToolError::invalid_argument(format!(
                    "Arguments for {} must be an object",
                    name
                )))
            }
        };
        self.catalog.validate_args(op, &args)?;
        let request = build_request(op, &args)?;
        self.stage(name, Stage::Built);

        let payload = self.gateway.send(&request).await?;
        self.stage(name, Stage::Sent);
        Ok(payload)
    }

    fn unknown_operation(&self, name: &str) -> ToolError {
        let suggestions = suggest(name, self.catalog.names(), MAX_SUGGESTIONS);
        let hint = if suggestions.is_empty() {
            "Call tools/list to see the available tools".to_string()
        } else {
            format!(
                "Did you mean: {} (or call tools/list for the full list)",
                suggestions.join(", ")
            )
        };
        ToolError::unknown_operation(name).with_hint(hint)
    }

    /// Protocol-facing call. Only fatal errors escape as a JSON-RPC fault;
    /// everything else is a failed tool result.
    pub async fn call(&self, name: &str, args: Value) -> Result<CallToolResult, McpError> {
        match self.invoke(name, args).await {
            Ok(payload) => Ok(CallToolResult::success(&payload)),
            Err(err) if err.kind.is_fatal() => {
                self.logger.error(
                    "Fatal invocation error",
                    Some(&serde_json::json!({"tool": name, "message": err.message})),
                );
                Err(McpError::new(ErrorCode::InternalError, err.message))
            }
            Err(err) => Ok(CallToolResult::failure(&err)),
        }
    }
}
