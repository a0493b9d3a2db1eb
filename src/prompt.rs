//! Prompt construction shared by every flow.
//!
//! A [`PromptSpec`] is the complete input to one generation call: a system
//! prompt that pins the reply to a JSON contract, a user prompt made of
//! labeled lines, and any prior chat turns. Builders here are pure; the same
//! parameters always render byte-identical prompts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::schema::UseCaseSchema;

/// The four AI helper use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UseCase {
    PricePrediction,
    NeighborhoodAnalysis,
    Chatbot,
    Recommendation,
}

impl UseCase {
    pub const ALL: [UseCase; 4] = [
        UseCase::PricePrediction,
        UseCase::NeighborhoodAnalysis,
        UseCase::Chatbot,
        UseCase::Recommendation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::PricePrediction => "price-prediction",
            UseCase::NeighborhoodAnalysis => "neighborhood-analysis",
            UseCase::Chatbot => "chatbot",
            UseCase::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UseCase {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        UseCase::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| FlowError::invalid_input("useCase", format!("unknown use case '{}'", s)))
    }
}

/// Who spoke a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One prior message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// System prompt, user prompt and prior turns for one generation call.
///
/// Fields are private so a constructed spec cannot be altered; the system
/// prompt is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    system_prompt: String,
    user_prompt: String,
    prior_turns: Vec<Turn>,
}

impl PromptSpec {
    /// Create a spec with no prior turns. Fails if the system prompt is blank.
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Result<Self> {
        let system_prompt = system_prompt.into();
        if system_prompt.trim().is_empty() {
            return Err(FlowError::invalid_input(
                "systemPrompt",
                "system prompt must not be empty",
            ));
        }
        Ok(Self {
            system_prompt,
            user_prompt: user_prompt.into(),
            prior_turns: Vec::new(),
        })
    }

    /// Attach prior turns, oldest first.
    pub fn with_prior_turns(mut self, turns: Vec<Turn>) -> Self {
        self.prior_turns = turns;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn prior_turns(&self) -> &[Turn] {
        &self.prior_turns
    }
}

/// Accumulates `Label: value` lines, skipping optional values that are absent.
///
/// # Example
///
/// ```
/// use estate_ai::prompt::LabeledLines;
///
/// let text = LabeledLines::new()
///     .line("Location", "Indiranagar")
///     .optional("Budget", None::<&str>)
///     .render();
/// assert_eq!(text, "Location: Indiranagar");
/// ```
#[derive(Debug, Default, Clone)]
pub struct LabeledLines {
    blocks: Vec<String>,
}

impl LabeledLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, label: &str, value: impl fmt::Display) -> Self {
        self.blocks.push(format!("{}: {}", label, value));
        self
    }

    pub fn optional<V: fmt::Display>(self, label: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.line(label, v),
            None => self,
        }
    }

    /// A labeled multi-line block, separated from neighbours by a blank line.
    pub fn section(mut self, label: &str, content: Option<&str>) -> Self {
        if let Some(content) = content {
            self.blocks.push(format!("{}:\n{}\n", label, content));
        }
        self
    }

    pub fn render(&self) -> String {
        self.blocks.join("\n")
    }
}

/// Render a system prompt that states the assistant's role and inlines the
/// JSON contract described by `schema`.
///
/// `guidance` lines are placed between the key list and the example skeleton.
pub fn system_prompt(role: &str, schema: &UseCaseSchema, guidance: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(role.trim());
    out.push_str("\n\nIMPORTANT: You MUST return ONLY a valid JSON object, with no text before or after it.\n");
    out.push_str("Return as JSON with keys:\n");
    out.push_str(&schema.describe());
    if !guidance.is_empty() {
        out.push('\n');
        for line in guidance {
            out.push('\n');
            out.push_str(line);
        }
    }
    out.push_str("\n\nSchema:\n");
    out.push_str(&schema.skeleton());
    out
}

/// Serialize prior turns as `role: content` lines, oldest first.
pub fn transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Treat blank optional strings as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
