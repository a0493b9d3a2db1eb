//! Property chatbot.
//!
//! Prior turns are sent twice: as `role: content` lines in the user prompt
//! and as native chat messages ahead of it. Both come from the same
//! `conversation_history`, oldest first.

use serde::{Deserialize, Serialize};

use super::Flow;
use crate::client::GenerationClient;
use crate::error::{FlowError, Result};
use crate::extract::Extracted;
use crate::prompt::{non_blank, system_prompt, transcript, LabeledLines, PromptSpec, Turn, UseCase};
use crate::schema::{Field, Kind, UseCaseSchema};

const ROLE: &str = "You are a helpful real estate assistant chatbot. Help users with property-related questions.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInput {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation_history: Vec<Turn>,
    /// Details of the listing the user is viewing, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<Vec<String>>,
}

static FIELDS: [Field; 2] = [
    Field::required("response", Kind::String),
    Field::optional(
        "suggestedActions",
        Kind::Array {
            items: &Kind::String,
            expected: None,
        },
    )
    .advisory(),
];

pub static CHATBOT_SCHEMA: UseCaseSchema = UseCaseSchema {
    use_case: UseCase::Chatbot,
    fields: &FIELDS,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyChatbot;

impl Flow for PropertyChatbot {
    type Input = ChatInput;
    type Output = ChatReply;

    const USE_CASE: UseCase = UseCase::Chatbot;

    fn schema() -> &'static UseCaseSchema {
        &CHATBOT_SCHEMA
    }

    fn validate(input: &ChatInput) -> Result<()> {
        if non_blank(Some(input.message.as_str())).is_none() {
            return Err(FlowError::invalid_input("message", "must not be empty"));
        }
        Ok(())
    }

    fn prompt(input: &ChatInput) -> Result<PromptSpec> {
        let history = if input.conversation_history.is_empty() {
            None
        } else {
            Some(transcript(&input.conversation_history))
        };
        let user = LabeledLines::new()
            .section("Previous conversation", history.as_deref())
            .section(
                "Current property context",
                non_blank(input.property_context.as_deref()),
            )
            .line("User question", input.message.trim())
            .render();

        Ok(PromptSpec::new(system_prompt(ROLE, &CHATBOT_SCHEMA, &[]), user)?
            .with_prior_turns(input.conversation_history.clone()))
    }
}

pub async fn chat(client: &GenerationClient, input: &ChatInput) -> Result<Extracted<ChatReply>> {
    super::run::<PropertyChatbot>(client, input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockReply, Role};
    use crate::extract::extract;
    use crate::flows::test_support::{fenced, mock_client};

    fn with_history() -> ChatInput {
        ChatInput {
            message: "Is covered parking included?".into(),
            conversation_history: vec![
                Turn::user("Show me 2BHKs in Whitefield"),
                Turn::assistant("Here are three options near ITPL."),
            ],
            property_context: Some("2BHK, 1150 sqft, Prestige Shantiniketan".into()),
        }
    }

    #[test]
    fn test_history_in_prompt_and_turns() {
        let spec = PropertyChatbot::prompt(&with_history()).unwrap();
        assert_eq!(
            spec.user_prompt(),
            "Previous conversation:\n\
             user: Show me 2BHKs in Whitefield\n\
             assistant: Here are three options near ITPL.\n\
             \n\
             Current property context:\n\
             2BHK, 1150 sqft, Prestige Shantiniketan\n\
             \n\
             User question: Is covered parking included?"
        );
        assert_eq!(spec.prior_turns(), with_history().conversation_history.as_slice());
    }

    #[test]
    fn test_prompt_is_pure() {
        let a = PropertyChatbot::prompt(&with_history()).unwrap();
        let b = PropertyChatbot::prompt(&with_history()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fenced_round_trip() {
        for payload in [
            ChatReply {
                response: "Yes. Type <think> in notes, or use {braces} freely.".into(),
                suggested_actions: Some(vec!["Schedule a visit".into(), "Ask about ```json".into()]),
            },
            ChatReply {
                response: "RERA registers projects.".into(),
                suggested_actions: None,
            },
        ] {
            let raw = fenced(&serde_json::to_value(&payload).unwrap());
            let out = extract::<ChatReply>(&raw, &CHATBOT_SCHEMA).unwrap();
            assert_eq!(out.payload, payload);
            assert!(out.warnings.is_empty());
        }
    }

    #[test]
    fn test_bare_question_has_no_blocks() {
        let input = ChatInput {
            message: "What is RERA?".into(),
            conversation_history: vec![],
            property_context: None,
        };
        let spec = PropertyChatbot::prompt(&input).unwrap();
        assert_eq!(spec.user_prompt(), "User question: What is RERA?");
        assert!(spec.prior_turns().is_empty());
    }

    #[test]
    fn test_blank_message_rejected() {
        let input = ChatInput {
            message: "   ".into(),
            ..with_history()
        };
        assert!(PropertyChatbot::validate(&input).is_err());
    }

    #[test]
    fn test_input_accepts_camel_case_body() {
        let input: ChatInput = serde_json::from_str(
            r#"{"message": "hi", "conversationHistory": [{"role": "user", "content": "earlier"}]}"#,
        )
        .unwrap();
        assert_eq!(input.conversation_history, vec![Turn::user("earlier")]);
        assert_eq!(input.property_context, None);
    }

    #[test]
    fn test_suggested_actions_optional() {
        let out = extract::<ChatReply>(r#"{"response": "Yes."}"#, &CHATBOT_SCHEMA).unwrap();
        assert_eq!(out.payload.suggested_actions, None);

        let out = extract::<ChatReply>(
            r#"{"response": "Yes.", "suggestedActions": "call the owner"}"#,
            &CHATBOT_SCHEMA,
        )
        .unwrap();
        assert_eq!(out.payload.response, "Yes.");
        assert_eq!(out.payload.suggested_actions, None);
        assert_eq!(out.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_sends_native_turns_in_order() {
        let (client, mock) = mock_client(vec![MockReply::Text(
            r#"<think>They asked about {parking}.</think>{"response": "Yes, one covered slot.", "suggestedActions": ["Schedule a visit"]}"#
                .into(),
        )]);

        let out = chat(&client, &with_history()).await.unwrap();
        assert_eq!(out.payload.response, "Yes, one covered slot.");
        assert_eq!(
            out.payload.suggested_actions,
            Some(vec!["Schedule a visit".to_string()])
        );

        let sent = &mock.requests()[0];
        let roles: Vec<Role> = sent.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(sent.messages[1].content, "Show me 2BHKs in Whitefield");
        assert!(sent.messages[3].content.ends_with("User question: Is covered parking included?"));
    }
}
