use crate::constants::{env as env_keys, protocols};
use crate::errors::ToolError;
use std::fmt;
use url::Url;

/// Connection settings for the upstream TestRail instance.
#[derive(Clone)]
pub struct UpstreamSettings {
    pub base_url: Url,
    pub username: String,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl UpstreamSettings {
    pub fn new(base_url: &str, username: &str) -> Result<Self, ToolError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            username: username.to_string(),
            password: None,
            api_key: None,
            timeout_ms: None,
        })
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Read settings through `lookup`. Empty or whitespace values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let url = read(env_keys::URL);
        let username = read(env_keys::USERNAME);
        if url.is_none() {
            missing.push(env_keys::URL);
        }
        if username.is_none() {
            missing.push(env_keys::USERNAME);
        }
        let password = read(env_keys::PASSWORD);
        let api_key = read(env_keys::API_KEY);
        if password.is_none() && api_key.is_none() {
            missing.push("TESTRAIL_PASSWORD or TESTRAIL_APIKEY");
        }
        let (Some(url), Some(username), true) = (url, username, missing.is_empty()) else {
            return Err(ToolError::missing_credentials(format!(
                "Missing TestRail credentials: {}",
                missing.join(", ")
            ))
            .with_hint("Set TESTRAIL_URL, TESTRAIL_USERNAME and TESTRAIL_APIKEY (or TESTRAIL_PASSWORD)."));
        };

        let timeout_ms = match read(env_keys::TIMEOUT_MS) {
            Some(raw) => Some(raw.parse::<u64>().ok().filter(|v| *v > 0).ok_or_else(|| {
                ToolError::missing_credentials(format!(
                    "{} must be a positive integer, got '{}'",
                    env_keys::TIMEOUT_MS,
                    raw
                ))
            })?),
            None => None,
        };

        Ok(Self {
            base_url: parse_base_url(&url)?,
            username,
            password,
            api_key,
            timeout_ms,
        })
    }

    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Secret used for basic auth. The API key wins over the password.
    pub fn secret(&self) -> &str {
        self.api_key
            .as_deref()
            .or(self.password.as_deref())
            .unwrap_or_default()
    }

    /// Full URL for an endpoint such as `get_case/7&limit=5`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!(
            "{}/{}{}",
            base,
            crate::constants::upstream::API_PREFIX,
            endpoint
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        ToolError::missing_credentials(format!("TESTRAIL_URL is not a valid URL: {}", err))
    })?;
    if !protocols::ALLOWED_HTTP.contains(&url.scheme()) {
        return Err(ToolError::missing_credentials(format!(
            "TESTRAIL_URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Where the gateway gets its settings on first use.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(UpstreamSettings),
    Environment,
}

impl CredentialSource {
    pub fn resolve(&self) -> Result<UpstreamSettings, ToolError> {
        match self {
            CredentialSource::Static(settings) => Ok(settings.clone()),
            CredentialSource::Environment => UpstreamSettings::from_env(),
        }
    }
}
