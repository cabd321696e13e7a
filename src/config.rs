use std::{env, fmt, time::Duration};

use reqwest::header::HeaderValue;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

pub const API_URL_VAR: &str = "API_URL";
pub const API_KEY_VAR: &str = "API_KEY";
pub const API_TIMEOUT_MS_VAR: &str = "API_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API_KEY environment variable is required")]
    MissingApiKey,
    #[error("invalid base url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("api key is not a valid header value")]
    InvalidApiKey,
    #[error("API_TIMEOUT_MS must be a positive number of milliseconds, got {0:?}")]
    InvalidTimeout(String),
}

/// Connection settings for the items API.
#[derive(Clone)]
pub struct ApiConfig {
    base_url: String,
    api_key: String,
    timeout: Option<Duration>,
}

impl ApiConfig {
    /// Validates `base_url` and `api_key`. A trailing `/` on the base url is
    /// dropped so paths can be appended with `format!`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let api_key = api_key.into();

        let parsed = Url::parse(&base_url).map_err(|err| ConfigError::InvalidUrl {
            url: base_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: base_url,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        if api_key.is_empty() || HeaderValue::from_str(&api_key).is_err() {
            return Err(ConfigError::InvalidApiKey);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: None,
        })
    }

    /// Reads `API_URL`, `API_KEY` and `API_TIMEOUT_MS` from the process
    /// environment. Only the key is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var(API_URL_VAR).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_key = env::var(API_KEY_VAR).map_err(|_| ConfigError::MissingApiKey)?;
        let timeout = env::var(API_TIMEOUT_MS_VAR)
            .ok()
            .map(|raw| parse_timeout_ms(&raw))
            .transpose()?;

        Ok(Self::new(base_url, api_key)?.with_optional_timeout(timeout))
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_optional_timeout(Some(timeout))
    }

    pub fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn log_startup(&self) {
        tracing::info!(
            base_url = %self.base_url,
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "items api configured"
        );
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub fn parse_timeout_ms(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}
