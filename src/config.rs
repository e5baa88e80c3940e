use crate::constants::env as env_keys;
use crate::constants::http::{DEFAULT_HOST, DEFAULT_PORT};
use crate::services::logger::LogLevel;
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MCP_TOOLS is not a valid JSON array of tool names: {0}")]
    InvalidToolList(String),
    #[error("invalid HTTP bind address '{0}'")]
    InvalidBindAddress(String),
    #[error("unknown log level '{0}' (expected error, warn, info or debug)")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

/// TestRail API exposed as MCP tools.
#[derive(Debug, Clone, Parser)]
#[command(name = "testrail-mcp", version, about)]
pub struct Cli {
    /// Transport to serve the protocol on.
    #[arg(long, env = env_keys::TRANSPORT, value_enum, default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Bind host for the HTTP transport.
    #[arg(long, env = env_keys::HTTP_HOST, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Bind port for the HTTP transport.
    #[arg(long, env = env_keys::HTTP_PORT, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Tools to expose: a JSON array or a comma-separated list. All tools when unset.
    #[arg(long = "tools", env = env_keys::TOOLS)]
    pub tools: Option<String>,

    #[arg(long, env = env_keys::LOG_LEVEL)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: Transport,
    pub bind: SocketAddr,
    pub allow_list: Option<Vec<String>>,
    pub log_level: Option<LogLevel>,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let host: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.host.clone()))?;
        let log_level = match self.log_level.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                LogLevel::parse(raw).ok_or_else(|| ConfigError::InvalidLogLevel(raw.to_string()))?,
            ),
        };
        Ok(Settings {
            transport: self.transport,
            bind: SocketAddr::new(host, self.port),
            allow_list: parse_tool_list(self.tools.as_deref())?,
            log_level,
        })
    }
}

/// `None` means every tool is exposed.
pub fn parse_tool_list(raw: Option<&str>) -> Result<Option<Vec<String>>, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let names: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str::<Vec<String>>(raw)
            .map_err(|err| ConfigError::InvalidToolList(err.to_string()))?
    } else {
        raw.split(',').map(str::to_string).collect()
    };
    let names: Vec<String> = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        Ok(None)
    } else {
        Ok(Some(names))
    }
}
