//! Structured reply extraction.
//!
//! Turns a model's free-form reply into a typed payload:
//!
//! 1. strip leading `<think>` / `<thinking>` reasoning blocks,
//! 2. locate the JSON candidate (```` ```json ```` fence, else a brace scan,
//!    else the whole text),
//! 3. parse it as a JSON object,
//! 4. validate it against the use case's [`UseCaseSchema`],
//! 5. deserialize it into the target type.
//!
//! Nothing here touches the network and no step ever substitutes a default
//! value for a reply that failed to parse or validate.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FlowError, Result};
use crate::schema::{SchemaWarning, UseCaseSchema};

/// Which rule located the JSON candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Content of the first ```` ```json ```` fenced block.
    Fenced,
    /// A brace-delimited span found by scanning.
    Braces,
    /// The entire (think-stripped, trimmed) text.
    Verbatim,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fenced => "fenced",
            Strategy::Braces => "braces",
            Strategy::Verbatim => "verbatim",
        }
    }
}

/// A validated payload plus what happened while extracting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub payload: T,
    pub strategy: Strategy,
    /// Non-fatal schema deviations (item counts, pruned advisory fields).
    pub warnings: Vec<SchemaWarning>,
}

impl<T> Extracted<T> {
    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        Extracted {
            payload: f(self.payload),
            strategy: self.strategy,
            warnings: self.warnings,
        }
    }
}

/// Extract, validate and decode a reply for the use case described by `schema`.
///
/// # Examples
///
/// ```
/// use estate_ai::extract::{extract, Strategy};
/// use estate_ai::flows::price::{PricePrediction, PRICE_PREDICTION_SCHEMA};
///
/// let reply = "Here you go:\n```json\n{\"estimatedPrice\": 9500000, \
///     \"priceRange\": {\"low\": 9000000, \"high\": 10000000}, \"confidence\": 72, \
///     \"factors\": [], \"marketInsight\": \"Steady demand.\"}\n```";
/// let out = extract::<PricePrediction>(reply, &PRICE_PREDICTION_SCHEMA).unwrap();
/// assert_eq!(out.strategy, Strategy::Fenced);
/// assert_eq!(out.payload.confidence, 72.0);
/// ```
pub fn extract<T: DeserializeOwned>(raw: &str, schema: &UseCaseSchema) -> Result<Extracted<T>> {
    let use_case = schema.use_case;
    let (strategy, candidate) = locate_candidate(raw);
    tracing::debug!(%use_case, strategy = strategy.as_str(), "located JSON candidate");

    let mut value: Value =
        serde_json::from_str(&candidate).map_err(|e| FlowError::MalformedJson {
            use_case,
            reason: e.to_string(),
            raw: raw.to_string(),
        })?;

    if !value.is_object() {
        return Err(FlowError::MalformedJson {
            use_case,
            reason: "expected a JSON object".into(),
            raw: raw.to_string(),
        });
    }

    let warnings = schema
        .validate(&mut value)
        .map_err(|v| FlowError::SchemaValidation {
            use_case,
            key: v.path,
            reason: v.reason,
            raw: raw.to_string(),
        })?;

    for w in &warnings {
        tracing::warn!(%use_case, path = %w.path, "{}", w.message);
    }

    let payload = serde_json::from_value::<T>(value).map_err(|e| FlowError::SchemaValidation {
        use_case,
        key: "$".into(),
        reason: e.to_string(),
        raw: raw.to_string(),
    })?;

    Ok(Extracted {
        payload,
        strategy,
        warnings,
    })
}

/// Pick the JSON candidate out of a reply. First match wins:
///
/// 1. content of the first ```` ```json ```` fence that has a closing fence,
/// 2. the last complete top-level `{...}` object, found by a string-aware
///    brace scanner; if no object closes, the span from the first `{` to the
///    last `}`,
/// 3. the whole text.
///
/// # Examples
///
/// ```
/// use estate_ai::extract::{locate_candidate, Strategy};
///
/// let (s, c) = locate_candidate("Result: {\"a\": {\"b\": 1}} done");
/// assert_eq!(s, Strategy::Braces);
/// assert_eq!(c, "{\"a\": {\"b\": 1}}");
/// ```
pub fn locate_candidate(raw: &str) -> (Strategy, String) {
    let cleaned = strip_think_tags(raw).trim();

    if let Some(content) = fenced_json(cleaned) {
        return (Strategy::Fenced, content.to_string());
    }

    if let Some(span) = last_object(cleaned).or_else(|| brace_span(cleaned)) {
        return (Strategy::Braces, span.to_string());
    }

    (Strategy::Verbatim, cleaned.to_string())
}

const THINK_TAGS: [(&str, &str); 2] = [("<think>", "</think>"), ("<thinking>", "</thinking>")];

/// Strip the closed `<think>...</think>` and `<thinking>...</thinking>` blocks
/// that lead the reply.
///
/// Tags later in the text may sit inside a JSON string and are kept. An
/// unclosed leading block is kept too, since its end is unknown.
///
/// # Examples
///
/// ```
/// use estate_ai::extract::strip_think_tags;
///
/// assert_eq!(strip_think_tags("<think>reasoning</think>result"), "result");
/// assert_eq!(strip_think_tags("<think>no closing tag"), "<think>no closing tag");
/// assert_eq!(strip_think_tags("say <think> here"), "say <think> here");
/// ```
pub fn strip_think_tags(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        let after = THINK_TAGS.iter().find_map(|(open, close)| {
            let body = rest.strip_prefix(open)?;
            let end = body.find(close)?;
            Some(&body[end + close.len()..])
        });
        match after {
            Some(after) => rest = after.trim_start(),
            None => return rest,
        }
    }
}

/// Content of the first ```` ```json ```` block (tag matched case-insensitively).
///
/// Every backtick run is checked as a possible opener, so an inline ```` ``` ````
/// earlier on the same line does not hide the real fence.
fn fenced_json(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find("```") {
        let after_backticks = search_from + offset + 3;

        if let Some(tag_len) = json_tag_len(&text[after_backticks..]) {
            let content_start = after_backticks + tag_len;
            let content = &text[content_start..];
            return closing_fence(content).map(|close| content[..close].trim());
        }

        search_from = after_backticks;
    }
    None
}

/// Offset of the closing fence. One at the start of a line wins over a
/// backtick run inside a JSON string on the same line.
fn closing_fence(content: &str) -> Option<usize> {
    if content.starts_with("```") {
        return Some(0);
    }
    content.find("\n```").or_else(|| content.find("```"))
}

/// Length of a `json` language tag plus its line ending, if `rest` starts with one.
fn json_tag_len(rest: &str) -> Option<usize> {
    let tag = rest.get(..4)?;
    if !tag.eq_ignore_ascii_case("json") {
        return None;
    }
    let line = &rest[4..];
    let padding = line.len() - line.trim_start_matches([' ', '\t', '\r']).len();
    match line[padding..].chars().next() {
        None => Some(4 + padding),
        Some('\n') => Some(4 + padding + 1),
        Some(_) => None,
    }
}

/// The last complete top-level `{...}` region, skipping braces inside strings.
fn last_object(text: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    let mut scan_from = 0;

    while let Some(offset) = text[scan_from..].find('{') {
        let start = scan_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape_next = false;
        let mut found_end = None;

        for (i, ch) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match ch {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        found_end = Some(start + i);
                        break;
                    }
                }
                _ => {}
            }
        }

        match found_end {
            Some(end) => {
                best = Some(&text[start..=end]);
                scan_from = end + 1;
            }
            None => break,
        }
    }

    best
}

/// Greedy span from the first `{` to the last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
