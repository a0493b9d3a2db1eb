//! Example: live price prediction against the Sarvam API.
//!
//! Reads `SARVAM_API_KEY` from the environment or a `.env` file.
//!
//! Run with: `RUST_LOG=estate_ai=debug cargo run --example price_prediction`

use estate_ai::flows::price::{predict_price, PricePredictionInput};
use estate_ai::retry::{retry_with_backoff, BackoffConfig};
use estate_ai::GenerationClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = GenerationClient::from_env()?;

    let input = PricePredictionInput {
        location: "Koramangala, Bangalore".into(),
        property_type: "APARTMENT".into(),
        bedrooms: 3,
        bathrooms: 2,
        area_sqft: 1400.0,
        amenities: vec!["Gym".into(), "Covered parking".into()],
        listing_type: Some("FOR_SALE".into()),
    };

    println!("Predicting price with model {}...", client.model());
    let out = retry_with_backoff(&BackoffConfig::interactive(), || {
        predict_price(&client, &input)
    })
    .await?;

    let p = &out.payload;
    println!("\nEstimated price: {}", p.estimated_price);
    println!("Range: {} - {}", p.price_range.low, p.price_range.high);
    println!("Confidence: {}%", p.confidence);
    println!("Factors:");
    for f in &p.factors {
        println!("  - {}: {}", f.factor, f.impact);
    }
    println!("Insight: {}", p.market_insight);

    println!("\nParse strategy: {}", out.strategy.as_str());
    for w in &out.warnings {
        println!("Warning at {}: {}", w.path, w.message);
    }

    Ok(())
}
