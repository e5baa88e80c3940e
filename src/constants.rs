pub mod server {
    pub const NAME: &str = "testrail-mcp-server";
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PROTOCOL_VERSION: &str = "2025-06-18";
    pub const SESSION_HEADER: &str = "Mcp-Session-Id";
}

pub mod upstream {
    /// Every endpoint hangs off this query-style prefix; filters are joined
    /// with `&` because the `?` is already spent.
    pub const API_PREFIX: &str = "index.php?/api/v2/";
    pub const ATTACHMENT_FIELD: &str = "attachment";
}

pub mod env {
    pub const URL: &str = "TESTRAIL_URL";
    pub const USERNAME: &str = "TESTRAIL_USERNAME";
    pub const PASSWORD: &str = "TESTRAIL_PASSWORD";
    pub const API_KEY: &str = "TESTRAIL_APIKEY";
    pub const TIMEOUT_MS: &str = "TESTRAIL_TIMEOUT_MS";
    pub const TOOLS: &str = "MCP_TOOLS";
    pub const TRANSPORT: &str = "MCP_TRANSPORT";
    pub const HTTP_HOST: &str = "MCP_HTTP_HOST";
    pub const HTTP_PORT: &str = "MCP_HTTP_PORT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

pub mod http {
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 8080;
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http", "https"];
}

pub mod suggest {
    pub const MAX_SUGGESTIONS: usize = 5;
}
