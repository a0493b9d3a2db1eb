//! The generation client.
//!
//! [`GenerationClient`] performs exactly one request/response exchange per
//! call: it checks the credential, builds a [`GenerationRequest`] from a
//! [`PromptSpec`], sends it through the configured [`Backend`] under a
//! timeout, and returns the raw completion text. It never retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Notify;

use crate::backend::{Backend, GenerationRequest, SarvamBackend};
use crate::config::{normalize_base_url, ClientConfig};
use crate::error::{FlowError, Result};
use crate::prompt::PromptSpec;

/// Shared cancellation signal.
///
/// Cancelling aborts any in-flight request made by a client holding this
/// handle; the reply, if one was partially received, is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Client for the text-generation backend.
///
/// Cheap to clone: the HTTP client and backend are reference counted.
///
/// # Example
///
/// ```
/// use estate_ai::{ClientConfig, GenerationClient};
///
/// let client = GenerationClient::builder(ClientConfig::new("my-key")).build().unwrap();
/// assert_eq!(client.model(), "sarvam-m");
/// ```
#[derive(Clone)]
pub struct GenerationClient {
    http: Client,
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    cancellation: Option<CancelHandle>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl GenerationClient {
    /// Create a new builder.
    pub fn builder(config: ClientConfig) -> GenerationClientBuilder {
        GenerationClientBuilder {
            config,
            client: None,
            backend: None,
            cancellation: None,
        }
    }

    /// Build a client from [`ClientConfig::from_env`] with the default backend.
    pub fn from_env() -> Result<Self> {
        Self::builder(ClientConfig::from_env()).build()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// A copy of this client whose calls are aborted when `handle` is cancelled.
    pub fn with_cancellation(&self, handle: CancelHandle) -> Self {
        Self {
            cancellation: Some(handle),
            ..self.clone()
        }
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(c) if c.is_cancelled() => Err(FlowError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Send one prompt and return the first completion's raw text.
    ///
    /// Fails with `Configuration` before building any request if the
    /// credential is unusable.
    pub async fn generate(&self, prompt: &PromptSpec) -> Result<String> {
        let credential = self.config.credential()?;
        self.check_cancelled()?;

        let request =
            GenerationRequest::from_prompt(&self.config.model, self.config.temperature, prompt);
        tracing::debug!(
            backend = self.backend.name(),
            model = %request.model,
            messages = request.messages.len(),
            "sending generation request"
        );

        let timeout = self.config.timeout;
        let call = tokio::time::timeout(
            timeout,
            self.backend
                .complete(&self.http, &self.config.base_url, credential, &request),
        );

        let outcome = match &self.cancellation {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FlowError::Cancelled),
                outcome = call => outcome,
            },
            None => call.await,
        };

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(FlowError::Timeout { .. })) | Err(_) => {
                return Err(FlowError::Timeout { after: timeout })
            }
            Ok(Err(e)) => return Err(e),
        };

        if response.text.trim().is_empty() {
            return Err(FlowError::EmptyResponse);
        }
        tracing::trace!(status = response.status, text = %response.text, "generation reply");
        Ok(response.text)
    }
}

/// Builder for [`GenerationClient`].
pub struct GenerationClientBuilder {
    config: ClientConfig,
    client: Option<Client>,
    backend: Option<Arc<dyn Backend>>,
    cancellation: Option<CancelHandle>,
}

impl GenerationClientBuilder {
    /// Set the HTTP client. If not set, one is built with the configured timeout.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the backend. Default: [`SarvamBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the cancellation handle.
    pub fn cancellation(mut self, cancel: CancelHandle) -> Self {
        self.cancellation = Some(cancel);
        self
    }

    /// Build the client. Fails only if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<GenerationClient> {
        let mut config = self.config;
        config.base_url = normalize_base_url(&config.base_url);

        let http = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| {
                    FlowError::Configuration(format!("failed to build HTTP client: {}", e))
                })?,
        };

        Ok(GenerationClient {
            http,
            config,
            backend: self.backend.unwrap_or_else(|| Arc::new(SarvamBackend)),
            cancellation: self.cancellation,
        })
    }
}
