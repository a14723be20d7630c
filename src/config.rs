use std::time::Duration;

/// Environment variable holding the agent service base URL.
pub const API_URL_ENV: &str = "VITE_API_URL";

/// Path appended to the base URL for every agent call.
pub const AGENT_RUN_PATH: &str = "/agent/run";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// 50 MiB, same ceiling the upload backend enforces.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Tag stamped into request metadata to identify the calling surface.
pub const DEFAULT_SOURCE: &str = "chat-ui";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; the agent service URL is required")]
    MissingBaseUrl(&'static str),
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the agent service, without the `/agent/run` suffix.
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub max_attachment_bytes: u64,
    pub source: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl AgentConfig {
    /// Load from the process environment, picking up a `.env` file if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(API_URL_ENV).and_then(|url| normalize_base_url(&url));
        if base_url.is_none() {
            tracing::warn!("{} is not set, agent calls will fail", API_URL_ENV);
        }
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(&url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attachment_bytes(mut self, max: u64) -> Self {
        self.max_attachment_bytes = max;
        self
    }

    /// Full URL of the agent run endpoint.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        self.base_url
            .as_deref()
            .map(|base| format!("{}{}", base, AGENT_RUN_PATH))
            .ok_or(ConfigError::MissingBaseUrl(API_URL_ENV))
    }
}

fn normalize_base_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
