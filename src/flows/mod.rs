//! Flow orchestrators.
//!
//! A flow is one named use case: typed parameters in, a validated payload
//! out. Every flow follows the same sequence, driven by [`run`]:
//!
//! ```text
//! validate input -> build prompt -> generate (one call) -> extract
//!        Built ------> Sent ------> AwaitingExtraction -> Succeeded | Failed
//! ```
//!
//! Flows hold no state and never retry; see [`crate::retry`] for the
//! caller-side helper.

pub mod chatbot;
pub mod neighborhood;
pub mod price;
pub mod recommend;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::GenerationClient;
use crate::error::{ErrorKind, FlowError, Result};
use crate::extract::{extract, Extracted};
use crate::prompt::{PromptSpec, UseCase};
use crate::schema::UseCaseSchema;

use chatbot::{ChatInput, ChatReply, PropertyChatbot};
use neighborhood::{NeighborhoodAnalysis, NeighborhoodAnalyzer, NeighborhoodInput};
use price::{PricePrediction, PricePredictionInput, PricePredictor};
use recommend::{PropertyRecommender, RecommendationInput, Recommendations};

/// One use case's input contract, prompt template and reply schema.
pub trait Flow {
    type Input: Sync;
    type Output: DeserializeOwned + Send;

    const USE_CASE: UseCase;

    /// The reply contract; also inlined into the system prompt.
    fn schema() -> &'static UseCaseSchema;

    /// Check caller parameters. Runs before any prompt is built.
    fn validate(input: &Self::Input) -> Result<()>;

    /// Render the prompt. Pure: equal inputs give equal specs.
    fn prompt(input: &Self::Input) -> Result<PromptSpec>;
}

/// Lifecycle of one flow call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Built,
    Sent,
    AwaitingExtraction,
    Succeeded,
    Failed(ErrorKind),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Succeeded | FlowState::Failed(_))
    }
}

/// Run flow `F` once.
pub async fn run<F: Flow>(
    client: &GenerationClient,
    input: &F::Input,
) -> Result<Extracted<F::Output>> {
    run_observed::<F>(client, input, |_| {}).await
}

/// Run flow `F` once, reporting each state transition to `observe`.
pub async fn run_observed<F: Flow>(
    client: &GenerationClient,
    input: &F::Input,
    mut observe: impl FnMut(FlowState) + Send,
) -> Result<Extracted<F::Output>> {
    let use_case = F::USE_CASE;
    let mut enter = |state: FlowState| {
        tracing::debug!(%use_case, ?state, "flow state");
        observe(state);
    };

    let outcome = drive::<F>(client, input, &mut enter).await;
    match &outcome {
        Ok(out) => {
            enter(FlowState::Succeeded);
            tracing::info!(
                %use_case,
                strategy = out.strategy.as_str(),
                warnings = out.warnings.len(),
                "flow completed"
            );
        }
        Err(e) => {
            enter(FlowState::Failed(e.kind()));
            tracing::warn!(%use_case, kind = ?e.kind(), error = %e, "flow failed");
        }
    }
    outcome
}

async fn drive<F: Flow>(
    client: &GenerationClient,
    input: &F::Input,
    enter: &mut (impl FnMut(FlowState) + Send),
) -> Result<Extracted<F::Output>> {
    F::validate(input)?;
    let prompt = F::prompt(input)?;
    enter(FlowState::Built);

    enter(FlowState::Sent);
    let raw = client.generate(&prompt).await?;

    enter(FlowState::AwaitingExtraction);
    extract::<F::Output>(&raw, F::schema())
}

/// A use-case tag plus its parsed parameters, as received from the inbound
/// request layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowRequest {
    PricePrediction(PricePredictionInput),
    NeighborhoodAnalysis(NeighborhoodInput),
    Chatbot(ChatInput),
    Recommendation(RecommendationInput),
}

/// The payload of any flow, serialized untagged so the wire shape is the
/// flow's own output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowResponse {
    PricePrediction(PricePrediction),
    NeighborhoodAnalysis(NeighborhoodAnalysis),
    Chatbot(ChatReply),
    Recommendation(Recommendations),
}

impl FlowRequest {
    /// Decode a JSON request body into the parameters for `use_case`.
    ///
    /// A body of the wrong shape is `InvalidInput`.
    pub fn parse(use_case: UseCase, body: Value) -> Result<Self> {
        fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
            serde_json::from_value(body).map_err(|e| FlowError::invalid_input("body", e.to_string()))
        }

        Ok(match use_case {
            UseCase::PricePrediction => FlowRequest::PricePrediction(decode(body)?),
            UseCase::NeighborhoodAnalysis => FlowRequest::NeighborhoodAnalysis(decode(body)?),
            UseCase::Chatbot => FlowRequest::Chatbot(decode(body)?),
            UseCase::Recommendation => FlowRequest::Recommendation(decode(body)?),
        })
    }

    pub fn use_case(&self) -> UseCase {
        match self {
            FlowRequest::PricePrediction(_) => UseCase::PricePrediction,
            FlowRequest::NeighborhoodAnalysis(_) => UseCase::NeighborhoodAnalysis,
            FlowRequest::Chatbot(_) => UseCase::Chatbot,
            FlowRequest::Recommendation(_) => UseCase::Recommendation,
        }
    }

    /// Validate the parameters and render the prompt without sending it.
    pub fn prompt(&self) -> Result<PromptSpec> {
        fn build<F: Flow>(input: &F::Input) -> Result<PromptSpec> {
            F::validate(input)?;
            F::prompt(input)
        }

        match self {
            FlowRequest::PricePrediction(i) => build::<PricePredictor>(i),
            FlowRequest::NeighborhoodAnalysis(i) => build::<NeighborhoodAnalyzer>(i),
            FlowRequest::Chatbot(i) => build::<PropertyChatbot>(i),
            FlowRequest::Recommendation(i) => build::<PropertyRecommender>(i),
        }
    }

    /// Run the matching flow.
    pub async fn execute(&self, client: &GenerationClient) -> Result<Extracted<FlowResponse>> {
        Ok(match self {
            FlowRequest::PricePrediction(i) => {
                run::<PricePredictor>(client, i).await?.map(FlowResponse::PricePrediction)
            }
            FlowRequest::NeighborhoodAnalysis(i) => run::<NeighborhoodAnalyzer>(client, i)
                .await?
                .map(FlowResponse::NeighborhoodAnalysis),
            FlowRequest::Chatbot(i) => {
                run::<PropertyChatbot>(client, i).await?.map(FlowResponse::Chatbot)
            }
            FlowRequest::Recommendation(i) => run::<PropertyRecommender>(client, i)
                .await?
                .map(FlowResponse::Recommendation),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{fenced, mock_client};
    use super::*;
    use crate::backend::MockReply;
    use serde_json::json;

    fn price_body() -> Value {
        json!({
            "location": "HSR Layout, Bangalore",
            "propertyType": "APARTMENT",
            "bedrooms": 2,
            "bathrooms": 2,
            "areaSqft": 1100
        })
    }

    fn price_reply() -> Value {
        json!({
            "estimatedPrice": 12500000.0,
            "priceRange": {"low": 11800000.0, "high": 13200000.0},
            "confidence": 68.0,
            "factors": [{"factor": "Metro access", "impact": "positive"}],
            "marketInsight": "Demand is steady."
        })
    }

    #[tokio::test]
    async fn test_state_sequence_on_success() {
        let (client, _) = mock_client(vec![MockReply::Text(fenced(&price_reply()))]);
        let input: PricePredictionInput = serde_json::from_value(price_body()).unwrap();

        let mut states = Vec::new();
        let out = run_observed::<PricePredictor>(&client, &input, |s| states.push(s))
            .await
            .unwrap();

        assert_eq!(out.payload.confidence, 68.0);
        assert_eq!(
            states,
            vec![
                FlowState::Built,
                FlowState::Sent,
                FlowState::AwaitingExtraction,
                FlowState::Succeeded
            ]
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_is_terminal_failed() {
        let (client, _) = mock_client(vec![MockReply::Text("no json here".into())]);
        let input: PricePredictionInput = serde_json::from_value(price_body()).unwrap();

        let mut states = Vec::new();
        let err = run_observed::<PricePredictor>(&client, &input, |s| states.push(s))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedJson);
        assert_eq!(states.last(), Some(&FlowState::Failed(ErrorKind::MalformedJson)));
        assert!(states.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_backend_failure_skips_extraction() {
        let (client, mock) = mock_client(vec![MockReply::Status(500)]);
        let input: PricePredictionInput = serde_json::from_value(price_body()).unwrap();

        let mut states = Vec::new();
        let err = run_observed::<PricePredictor>(&client, &input, |s| states.push(s))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(!states.contains(&FlowState::AwaitingExtraction));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_build() {
        let (client, mock) = mock_client(vec![MockReply::Text("{}".into())]);
        let mut body = price_body();
        body["location"] = json!("  ");
        let input: PricePredictionInput = serde_json::from_value(body).unwrap();

        let mut states = Vec::new();
        let err = run_observed::<PricePredictor>(&client, &input, |s| states.push(s))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(states, vec![FlowState::Failed(ErrorKind::InvalidInput)]);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_request_parse_rejects_wrong_shape() {
        let err = FlowRequest::parse(UseCase::PricePrediction, json!({"location": "X"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = FlowRequest::parse(UseCase::Chatbot, json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_request_prompt_matches_flow_prompt() {
        let request = FlowRequest::parse(UseCase::PricePrediction, price_body()).unwrap();
        assert_eq!(request.use_case(), UseCase::PricePrediction);

        let input: PricePredictionInput = serde_json::from_value(price_body()).unwrap();
        assert_eq!(request.prompt().unwrap(), PricePredictor::prompt(&input).unwrap());
    }

    #[tokio::test]
    async fn test_execute_serializes_flow_shape() {
        let (client, _) = mock_client(vec![MockReply::Text(fenced(&price_reply()))]);
        let request = FlowRequest::parse(UseCase::PricePrediction, price_body()).unwrap();

        let out = request.execute(&client).await.unwrap();
        let wire = serde_json::to_value(&out.payload).unwrap();
        assert_eq!(wire, price_reply());
    }
}
