//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over text-generation providers, translating
//! a normalized [`GenerationRequest`] into one HTTP exchange and returning a
//! [`GenerationResponse`]. Built-in implementations: [`SarvamBackend`] and
//! the in-memory [`MockBackend`].
//!
//! ## Architecture
//!
//! ```text
//! GenerationClient ──► GenerationRequest ──► Backend::complete() ──► GenerationResponse
//!                                                   │
//!                                        ┌──────────┴──────────┐
//!                                  SarvamBackend           MockBackend
//!                               /v1/chat/completions     canned replies
//! ```

pub mod mock;
pub mod sarvam;

pub use mock::{MockBackend, MockReply};
pub use sarvam::SarvamBackend;

use crate::error::Result;
use crate::prompt::{PromptSpec, TurnRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

/// A normalized chat-completions request. Serializes to the wire body
/// `{ "model", "messages", "temperature" }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Model identifier (e.g. `"sarvam-m"`).
    pub model: String,
    /// System message first, then prior turns in order, then the user prompt.
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

impl GenerationRequest {
    /// Build the message list from a prompt: exactly one system message, first.
    pub fn from_prompt(model: impl Into<String>, temperature: f64, prompt: &PromptSpec) -> Self {
        let mut messages = Vec::with_capacity(prompt.prior_turns().len() + 2);
        messages.push(ChatMessage {
            role: Role::System,
            content: prompt.system_prompt().to_string(),
        });
        for turn in prompt.prior_turns() {
            messages.push(ChatMessage {
                role: turn.role.into(),
                content: turn.content.clone(),
            });
        }
        messages.push(ChatMessage {
            role: Role::User,
            content: prompt.user_prompt().to_string(),
        });

        Self {
            model: model.into(),
            messages,
            temperature,
        }
    }
}

/// A normalized generation response.
#[derive(Debug)]
pub struct GenerationResponse {
    /// The first completion's text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token usage, model id), stored as raw JSON.
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over text-generation providers.
///
/// One call to [`complete`](Backend::complete) is exactly one outbound
/// exchange: no retry, no caching, no deduplication.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        credential: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}
