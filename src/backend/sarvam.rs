//! Backend for the Sarvam chat-completions API.
//!
//! Endpoint: `{base}/v1/chat/completions`, authenticated with the
//! `api-subscription-key` header. Completion text is read from
//! `choices[0].message.content`.

use super::{Backend, GenerationRequest, GenerationResponse};
use crate::error::{truncate, FlowError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Header carrying the subscription key.
pub const CREDENTIAL_HEADER: &str = "api-subscription-key";

/// Upper bound on how much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 500;

/// Backend for the Sarvam (OpenAI-style) chat-completions endpoint.
///
/// # Example
///
/// ```
/// use estate_ai::backend::SarvamBackend;
///
/// let backend = SarvamBackend::new();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SarvamBackend;

impl SarvamBackend {
    pub fn new() -> Self {
        Self
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }

    /// Build the reqwest request with appropriate headers.
    fn build_http_request(
        client: &Client,
        url: &str,
        credential: &str,
        request: &GenerationRequest,
    ) -> reqwest::RequestBuilder {
        client
            .post(url)
            .header(CREDENTIAL_HEADER, credential)
            .json(request)
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        value
            .trim()
            .parse::<u64>()
            .ok()
            .map(std::time::Duration::from_secs)
    }

    /// First completion's content, if it is a non-blank string.
    fn completion_text(json_resp: &Value) -> Option<&str> {
        json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["usage", "model", "id"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for SarvamBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        credential: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let url = Self::endpoint(base_url);

        let resp = Self::build_http_request(client, &url, credential, request)
            .send()
            .await?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(status, body = %truncate(&text, 200), "generation backend returned an error status");
            return Err(FlowError::Backend {
                status,
                body: truncate(&text, ERROR_BODY_LIMIT),
                retry_after,
            });
        }

        let body = resp.text().await?;
        let json_resp: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "generation backend body was not JSON");
                return Err(FlowError::EmptyResponse);
            }
        };

        let text = Self::completion_text(&json_resp)
            .ok_or(FlowError::EmptyResponse)?
            .to_string();

        Ok(GenerationResponse {
            text,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "sarvam"
    }
}
