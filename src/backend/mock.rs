//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] plays back pre-configured replies in order and records
//! every request it receives, so tests can assert on message order or on
//! the number of outbound calls.
//!
//! # Example
//!
//! ```
//! use estate_ai::backend::MockBackend;
//!
//! let mock = MockBackend::fixed(r#"{"response": "Hello!"}"#);
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, GenerationRequest, GenerationResponse};
use crate::error::{FlowError, Result};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Succeed with this completion text.
    Text(String),
    /// Succeed with this text after sleeping.
    Delayed(Duration, String),
    /// Fail with a non-success HTTP status.
    Status(u16),
    /// Fail as if the body carried no completion.
    Empty,
    /// Fail at the transport level.
    Transport(String),
}

/// A test backend that returns scripted replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given scripted replies.
    ///
    /// # Panics
    ///
    /// Panics if `replies` is empty.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Text(text.into())])
    }

    /// Create a mock that always fails with `reply`.
    pub fn failing(reply: MockReply) -> Self {
        Self::new(vec![reply])
    }

    /// Number of `complete` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        _credential: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        let text = match self.next_reply() {
            MockReply::Text(text) => text,
            MockReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                text
            }
            MockReply::Status(status) => {
                return Err(FlowError::Backend {
                    status,
                    body: "mock failure".into(),
                    retry_after: None,
                })
            }
            MockReply::Empty => return Err(FlowError::EmptyResponse),
            MockReply::Transport(reason) => return Err(FlowError::Transport(reason)),
        };

        Ok(GenerationResponse {
            text,
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptSpec;

    fn request() -> GenerationRequest {
        let prompt = PromptSpec::new("sys", "user").unwrap();
        GenerationRequest::from_prompt("test", 0.1, &prompt)
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let resp = mock
            .complete(&Client::new(), "http://unused", "key", &request())
            .await
            .unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.status, 200);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.requests()[0].model, "test");
    }

    #[tokio::test]
    async fn test_mock_cycles_replies() {
        let mock = MockBackend::new(vec![
            MockReply::Text("first".into()),
            MockReply::Status(503),
        ]);
        let client = Client::new();
        let r1 = mock.complete(&client, "http://unused", "k", &request()).await;
        let r2 = mock.complete(&client, "http://unused", "k", &request()).await;
        let r3 = mock.complete(&client, "http://unused", "k", &request()).await;
        assert_eq!(r1.unwrap().text, "first");
        assert!(matches!(r2, Err(FlowError::Backend { status: 503, .. })));
        assert_eq!(r3.unwrap().text, "first");
        assert_eq!(mock.calls(), 3);
    }
}
