//! Example: all four flows against a MockBackend, through the request layer.
//!
//! Run with: `cargo run --example mock_flows`

use std::sync::Arc;

use estate_ai::api::{dispatch, Identity};
use estate_ai::backend::{MockBackend, MockReply};
use estate_ai::{ClientConfig, GenerationClient, UseCase};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockBackend::new(vec![
        MockReply::Text(
            "Based on recent sales:\n```json\n{\"estimatedPrice\": 18000000, \
             \"priceRange\": {\"low\": 16500000, \"high\": 19500000}, \"confidence\": 74, \
             \"factors\": [{\"factor\": \"Location\", \"impact\": \"positive\"}], \
             \"marketInsight\": \"Premium micro-market.\"}\n```"
                .into(),
        ),
        MockReply::Text(
            "{\"overview\": \"Green and quiet.\", \"ratings\": {\"safety\": 8, \"schools\": 8, \
             \"transportation\": 6, \"shopping\": 7, \"dining\": 7, \"parks\": 9, \"overall\": 8}, \
             \"highlights\": [\"Lake views\", \"Good schools\", \"Low noise\"], \
             \"considerations\": [\"Far from metro\", \"Limited nightlife\"], \
             \"averagePrice\": \"₹95L - ₹1.6Cr\"}"
                .into(),
        ),
        MockReply::Text(
            "<think>Parking question.</think>{\"response\": \"Yes, one covered slot is included.\", \
             \"suggestedActions\": [\"Schedule a visit\"]}"
                .into(),
        ),
        MockReply::Text(
            "{\"recommendations\": [{\"suggestion\": \"3BHK in HSR Layout\", \
             \"reasoning\": \"Near offices\", \"priceRange\": \"₹50K/month\", \"matchScore\": 86}], \
             \"summary\": \"HSR fits best.\", \
             \"filters\": {\"bedrooms\": \"3\", \"listingType\": \"FOR_RENT\", \"type\": \"CONDO\"}}"
                .into(),
        ),
    ]));

    let client = GenerationClient::builder(ClientConfig::new("demo-key"))
        .backend(mock.clone())
        .build()?;
    let caller = Identity::new("user-1", "USER");

    let requests = [
        (
            UseCase::PricePrediction,
            json!({"location": "Koramangala, Bangalore", "propertyType": "APARTMENT",
                   "bedrooms": 3, "bathrooms": 2, "areaSqft": 1400}),
        ),
        (
            UseCase::NeighborhoodAnalysis,
            json!({"location": "Jakkur, Bangalore", "propertyType": "VILLA"}),
        ),
        (
            UseCase::Chatbot,
            json!({"message": "Is parking included?",
                   "conversationHistory": [{"role": "user", "content": "Show me 2BHKs"}]}),
        ),
        (
            UseCase::Recommendation,
            json!({"preferences": "3 BHK for rent near Outer Ring Road", "budget": 60000}),
        ),
    ];

    for (use_case, body) in requests {
        let resp = dispatch(&client, Some(&caller), use_case, body).await;
        println!("{} -> {}", use_case, resp.status);
        println!("{}\n", serde_json::to_string_pretty(&resp.body)?);
    }

    let resp = dispatch(&client, None, UseCase::Chatbot, json!({"message": "hi"})).await;
    println!("anonymous -> {} {}", resp.status, resp.body);
    println!("backend calls: {}", mock.calls());

    Ok(())
}
