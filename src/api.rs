//! Framework-agnostic request handling for the AI helper endpoints.
//!
//! [`dispatch`] takes what an HTTP layer already has (the authenticated
//! caller, the use case the route maps to, and the JSON body) and returns a
//! status code plus JSON body ready to write back. Callers without a session
//! are rejected before the body is looked at.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::Instrument;

use crate::client::GenerationClient;
use crate::error::{FlowError, USER_FACING_MESSAGE};
use crate::flows::FlowRequest;
use crate::prompt::UseCase;

/// Non-standard status for a request abandoned by its caller.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// The authenticated caller, as resolved by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

/// Status code and JSON body for the HTTP layer to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            body,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED.as_u16(),
            body: json!({ "success": false, "error": "Unauthorized" }),
        }
    }

    /// The `{ error }` envelope. Only the user-safe message is included.
    pub fn from_error(err: &FlowError) -> Self {
        Self {
            status: status_for(err),
            body: json!({ "error": err.user_message() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP status for a failed flow.
pub fn status_for(err: &FlowError) -> u16 {
    match err {
        FlowError::InvalidInput { .. } => StatusCode::BAD_REQUEST.as_u16(),
        FlowError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        FlowError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT.as_u16(),
        FlowError::Cancelled => CLIENT_CLOSED_REQUEST,
        FlowError::Transport(_)
        | FlowError::Backend { .. }
        | FlowError::EmptyResponse
        | FlowError::MalformedJson { .. }
        | FlowError::SchemaValidation { .. } => StatusCode::BAD_GATEWAY.as_u16(),
    }
}

/// Handle one AI helper request.
pub async fn dispatch(
    client: &GenerationClient,
    identity: Option<&Identity>,
    use_case: UseCase,
    body: Value,
) -> ApiResponse {
    let Some(identity) = identity else {
        tracing::debug!(%use_case, "rejecting unauthenticated request");
        return ApiResponse::unauthorized();
    };

    let span = tracing::info_span!("ai_request", %use_case, user = %identity.user_id);
    let outcome = async {
        let request = FlowRequest::parse(use_case, body)?;
        request.execute(client).await
    }
    .instrument(span)
    .await;

    match outcome {
        Ok(out) => match serde_json::to_value(&out.payload) {
            Ok(value) => ApiResponse::ok(value),
            Err(e) => {
                tracing::warn!(%use_case, error = %e, "failed to serialize flow output");
                ApiResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    body: json!({ "error": USER_FACING_MESSAGE }),
                }
            }
        },
        Err(e) => {
            if let Some(raw) = e.raw_reply() {
                tracing::debug!(%use_case, raw = %raw, "rejected model reply");
            }
            ApiResponse::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockReply;
    use crate::flows::test_support::mock_client;
    use std::time::Duration;

    fn caller() -> Identity {
        Identity::new("user-42", "USER")
    }

    #[tokio::test]
    async fn test_no_identity_is_401_without_call() {
        let (client, mock) = mock_client(vec![MockReply::Text("{}".into())]);
        let resp = dispatch(&client, None, UseCase::Chatbot, json!({"message": "hi"})).await;
        assert_eq!(resp.status, 401);
        assert_eq!(resp.body["error"], "Unauthorized");
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_body_is_400() {
        let (client, mock) = mock_client(vec![MockReply::Text("{}".into())]);
        let resp = dispatch(
            &client,
            Some(&caller()),
            UseCase::NeighborhoodAnalysis,
            json!({"propertyType": "VILLA"}),
        )
        .await;
        assert_eq!(resp.status, 400);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_body_is_payload() {
        let (client, _) = mock_client(vec![MockReply::Text(
            r#"{"response": "Yes, pets are allowed."}"#.into(),
        )]);
        let resp = dispatch(
            &client,
            Some(&caller()),
            UseCase::Chatbot,
            json!({"message": "Are pets allowed?"}),
        )
        .await;
        assert!(resp.is_success());
        assert_eq!(resp.body, json!({"response": "Yes, pets are allowed."}));
    }

    #[tokio::test]
    async fn test_malformed_reply_hides_diagnostics() {
        let (client, _) = mock_client(vec![MockReply::Text(
            "Sure! {\"response\": \"secret internal text\",}".into(),
        )]);
        let resp = dispatch(
            &client,
            Some(&caller()),
            UseCase::Chatbot,
            json!({"message": "hello"}),
        )
        .await;
        assert_eq!(resp.status, 502);
        assert_eq!(resp.body, json!({"error": USER_FACING_MESSAGE}));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&FlowError::Configuration("x".into())), 500);
        assert_eq!(status_for(&FlowError::invalid_input("message", "empty")), 400);
        assert_eq!(
            status_for(&FlowError::Timeout {
                after: Duration::from_secs(60)
            }),
            504
        );
        assert_eq!(status_for(&FlowError::EmptyResponse), 502);
        assert_eq!(status_for(&FlowError::Transport("reset".into())), 502);
        assert_eq!(status_for(&FlowError::Cancelled), 499);
    }

    #[test]
    fn test_invalid_input_message_reaches_caller() {
        let resp = ApiResponse::from_error(&FlowError::invalid_input("message", "must not be empty"));
        let text = resp.body["error"].as_str().unwrap();
        assert!(text.contains("message"));
    }
}
