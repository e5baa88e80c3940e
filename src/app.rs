use crate::config::Settings;
use crate::errors::ToolError;
use crate::mcp::catalog::Catalog;
use crate::services::credentials::CredentialSource;
use crate::services::dispatcher::Dispatcher;
use crate::services::gateway::{Gateway, HttpGateway};
use crate::services::logger::Logger;
use std::sync::Arc;

/// Process-wide wiring: catalog, gateway and dispatcher share one logger.
pub struct App {
    pub logger: Logger,
    pub catalog: Arc<Catalog>,
    pub dispatcher: Arc<Dispatcher>,
}

impl App {
    pub fn initialize(settings: &Settings) -> Result<Self, ToolError> {
        let mut logger = Logger::new("testrail");
        if let Some(level) = settings.log_level {
            logger = logger.with_level(level);
        }
        let gateway = Arc::new(HttpGateway::new(
            logger.clone(),
            CredentialSource::Environment,
        ));
        Self::with_gateway(logger, settings.allow_list.as_deref(), gateway)
    }

    pub fn with_gateway(
        logger: Logger,
        allow_list: Option<&[String]>,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self, ToolError> {
        let catalog = Arc::new(Catalog::builtin(allow_list)?);
        if !catalog.ignored_allow_list().is_empty() {
            logger.warn(
                "Ignoring unknown tools in allow-list",
                Some(&serde_json::json!({"tools": catalog.ignored_allow_list()})),
            );
        }
        if catalog.is_empty() {
            logger.warn("No tools are exposed; check MCP_TOOLS", None);
        }
        logger.info(
            "Tool catalog loaded",
            Some(&serde_json::json!({"tools": catalog.len()})),
        );

        let dispatcher = Arc::new(Dispatcher::new(logger.clone(), catalog.clone(), gateway));
        Ok(Self {
            logger,
            catalog,
            dispatcher,
        })
    }
}
