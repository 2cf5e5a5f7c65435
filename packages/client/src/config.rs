use crate::error::ConfigError;
use reqwest::header::HeaderName;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "formset.config.json";

/// Environment variable that overrides `endpoint`
pub const ENDPOINT_ENV: &str = "FORMSET_ENDPOINT";

/// Client configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// URL receiving submissions and option lookups
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// URL receiving file uploads; defaults to `endpoint`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_endpoint: Option<String>,

    /// Name of the environment variable holding the session token
    #[serde(default = "default_session_token_env")]
    pub session_token_env: String,

    /// Header the session token is sent in
    #[serde(default = "default_session_header")]
    pub session_header: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Requested thumbnail height for image uploads
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
}

fn default_endpoint() -> String {
    "http://localhost:8000/".to_string()
}

fn default_session_token_env() -> String {
    "FORMSET_SESSION_TOKEN".to_string()
}

fn default_session_header() -> String {
    "X-CSRFToken".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_thumbnail_height() -> u32 {
    128
}

impl ClientConfig {
    /// Load config from a directory, then apply environment overrides
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            ClientConfig::default()
        };

        let config = config.with_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.is_empty()) {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        self.upload_url()?;
        self.header_name()?;
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))
    }

    pub fn upload_url(&self) -> Result<Url, ConfigError> {
        let raw = self.upload_endpoint.as_deref().unwrap_or(&self.endpoint);
        Url::parse(raw).map_err(|_| ConfigError::InvalidEndpoint(raw.to_string()))
    }

    pub fn header_name(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_bytes(self.session_header.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(self.session_header.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            upload_endpoint: None,
            session_token_env: default_session_token_env(),
            session_header: default_session_header(),
            timeout_ms: default_timeout_ms(),
            thumbnail_height: default_thumbnail_height(),
        }
    }
}
