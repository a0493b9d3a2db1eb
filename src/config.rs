//! Backend configuration.
//!
//! [`ClientConfig`] is read once (typically at process start) and handed to
//! [`GenerationClient::builder`](crate::client::GenerationClient::builder).
//! A missing or placeholder credential is not an error here; it surfaces as
//! [`FlowError::Configuration`] on every call instead.

use std::time::Duration;

use crate::error::{FlowError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.sarvam.ai";
pub const DEFAULT_MODEL: &str = "sarvam-m";
/// Low temperature keeps the JSON contract stable across calls.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Value shipped in the sample `.env`; treated the same as an unset key.
pub const PLACEHOLDER_KEY: &str = "your_sarvam_api_key_here";

pub const ENV_API_KEY: &str = "SARVAM_API_KEY";
pub const ENV_BASE_URL: &str = "SARVAM_BASE_URL";
pub const ENV_MODEL: &str = "SARVAM_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "SARVAM_TIMEOUT_SECS";

/// Credential, endpoint and request settings for the generation backend.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::default().with_api_key(api_key)
    }

    /// Read settings from the process environment.
    ///
    /// Unset variables keep their defaults; an unparsable timeout also keeps
    /// the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.api_key = lookup(ENV_API_KEY);
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        match lookup(ENV_TIMEOUT_SECS).map(|t| t.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config.timeout = Duration::from_secs(secs),
            Some(_) => tracing::warn!(var = ENV_TIMEOUT_SECS, "ignoring invalid timeout"),
            None => {}
        }
        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The usable credential, or `Configuration` if it is unset, blank or the placeholder.
    pub fn credential(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            None | Some("") => Err(FlowError::Configuration(format!(
                "{} is not set",
                ENV_API_KEY
            ))),
            Some(PLACEHOLDER_KEY) => Err(FlowError::Configuration(format!(
                "{} still holds the placeholder value",
                ENV_API_KEY
            ))),
            Some(key) => Ok(key),
        }
    }
}

fn redact(key: &str) -> String {
    match key.get(..4) {
        Some(prefix) if key.len() > 8 => format!("{}***", prefix),
        _ => "***".to_string(),
    }
}

/// Strip known provider path suffixes from a base URL.
/// This prevents double-pathing when the backend appends its own path.
/// e.g., "https://api.sarvam.ai/v1" -> "https://api.sarvam.ai"
pub(crate) fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    for suffix in &["/v1/chat/completions", "/v1/chat", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
