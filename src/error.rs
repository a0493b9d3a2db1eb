use std::time::Duration;
use thiserror::Error;

use crate::prompt::UseCase;

/// Message shown to end users for any failed flow. Diagnostic detail stays in logs.
pub const USER_FACING_MESSAGE: &str = "We couldn't complete this AI request. Please try again.";

/// Errors produced by the flows and their components.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Credential missing or still set to the sample placeholder.
    #[error("Generation backend is not configured: {0}")]
    Configuration(String),

    /// Caller parameters violate the flow's input contract.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// Low-level HTTP transport failure (connection refused, reset, bad TLS).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The request did not complete within the configured bound.
    #[error("Generation request timed out after {after:?}")]
    Timeout { after: Duration },

    /// HTTP error with status code, response body, and optional Retry-After hint.
    #[error("Generation backend returned HTTP {status}")]
    Backend {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text, truncated.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The backend replied but carried no completion text.
    #[error("Generation backend returned an empty response")]
    EmptyResponse,

    /// No JSON object could be parsed from the reply.
    #[error("{use_case} reply was not valid JSON: {reason}")]
    MalformedJson {
        use_case: UseCase,
        reason: String,
        /// The untouched reply text, for logs only.
        raw: String,
    },

    /// JSON parsed but a required key is missing or has the wrong type or range.
    #[error("{use_case} reply failed validation at '{key}': {reason}")]
    SchemaValidation {
        use_case: UseCase,
        key: String,
        reason: String,
        /// The untouched reply text, for logs only.
        raw: String,
    },

    /// The call was cancelled before it reached a terminal state.
    #[error("Request was cancelled")]
    Cancelled,
}

/// Stable, data-free tag for each [`FlowError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    Transport,
    Timeout,
    Backend,
    EmptyResponse,
    MalformedJson,
    SchemaValidation,
    Cancelled,
}

impl FlowError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Configuration(_) => ErrorKind::Configuration,
            FlowError::InvalidInput { .. } => ErrorKind::InvalidInput,
            FlowError::Transport(_) => ErrorKind::Transport,
            FlowError::Timeout { .. } => ErrorKind::Timeout,
            FlowError::Backend { .. } => ErrorKind::Backend,
            FlowError::EmptyResponse => ErrorKind::EmptyResponse,
            FlowError::MalformedJson { .. } => ErrorKind::MalformedJson,
            FlowError::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            FlowError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a caller may reasonably re-issue the same call.
    ///
    /// Backend statuses are retryable only for 429 and 5xx. Malformed or
    /// invalid replies are retryable because generation is stochastic.
    pub fn is_retryable(&self) -> bool {
        match self {
            FlowError::Transport(_) | FlowError::Timeout { .. } => true,
            FlowError::Backend { status, .. } => *status == 429 || *status >= 500,
            FlowError::MalformedJson { .. } | FlowError::SchemaValidation { .. } => true,
            FlowError::Configuration(_)
            | FlowError::InvalidInput { .. }
            | FlowError::EmptyResponse
            | FlowError::Cancelled => false,
        }
    }

    /// The raw model reply, when the failure happened after one was received.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            FlowError::MalformedJson { raw, .. } | FlowError::SchemaValidation { raw, .. } => {
                Some(raw)
            }
            _ => None,
        }
    }

    /// Text safe to show an end user.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::InvalidInput { .. } => self.to_string(),
            _ => USER_FACING_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured bound on the error.
            FlowError::Timeout {
                after: Duration::ZERO,
            }
        } else {
            FlowError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

/// Truncate a string to at most `max_len` bytes on a char boundary, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
