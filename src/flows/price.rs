//! Price prediction for a single listing.

use serde::{Deserialize, Serialize};

use super::Flow;
use crate::client::GenerationClient;
use crate::error::{FlowError, Result};
use crate::extract::Extracted;
use crate::prompt::{non_blank, system_prompt, LabeledLines, PromptSpec, UseCase};
use crate::schema::{Field, Kind, UseCaseSchema};

const ROLE: &str = "You are a real estate market analyst. Predict the market price for a property based on details.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePredictionInput {
    pub location: String,
    pub property_type: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area_sqft: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePrediction {
    pub estimated_price: f64,
    pub price_range: PriceRange,
    /// 0-100.
    pub confidence: f64,
    pub factors: Vec<PriceFactor>,
    pub market_insight: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFactor {
    pub factor: String,
    pub impact: String,
}

static PRICE_RANGE_FIELDS: [Field; 2] = [
    Field::required("low", Kind::non_negative()),
    Field::required("high", Kind::non_negative()),
];

static FACTOR_FIELDS: [Field; 2] = [
    Field::required("factor", Kind::String),
    Field::required("impact", Kind::String),
];

static FACTOR: Kind = Kind::Object(&FACTOR_FIELDS);

static FIELDS: [Field; 5] = [
    Field::required("estimatedPrice", Kind::non_negative()),
    Field::required("priceRange", Kind::Object(&PRICE_RANGE_FIELDS)),
    Field::required("confidence", Kind::range(0.0, 100.0)),
    Field::required(
        "factors",
        Kind::Array {
            items: &FACTOR,
            expected: None,
        },
    ),
    Field::required("marketInsight", Kind::String),
];

/// Reply contract for price prediction.
pub static PRICE_PREDICTION_SCHEMA: UseCaseSchema = UseCaseSchema {
    use_case: UseCase::PricePrediction,
    fields: &FIELDS,
};

/// Estimates a market price from listing details.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricePredictor;

impl Flow for PricePredictor {
    type Input = PricePredictionInput;
    type Output = PricePrediction;

    const USE_CASE: UseCase = UseCase::PricePrediction;

    fn schema() -> &'static UseCaseSchema {
        &PRICE_PREDICTION_SCHEMA
    }

    fn validate(input: &PricePredictionInput) -> Result<()> {
        if non_blank(Some(input.location.as_str())).is_none() {
            return Err(FlowError::invalid_input("location", "must not be empty"));
        }
        if non_blank(Some(input.property_type.as_str())).is_none() {
            return Err(FlowError::invalid_input("propertyType", "must not be empty"));
        }
        if !input.area_sqft.is_finite() || input.area_sqft < 0.0 {
            return Err(FlowError::invalid_input(
                "areaSqft",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }

    fn prompt(input: &PricePredictionInput) -> Result<PromptSpec> {
        let amenities = non_empty_list(&input.amenities);
        let user = LabeledLines::new()
            .line("Location", input.location.trim())
            .line("Type", input.property_type.trim())
            .line("Bedrooms", input.bedrooms)
            .line("Bathrooms", input.bathrooms)
            .line("Area", format!("{} sqft", input.area_sqft))
            .optional("Amenities", amenities)
            .optional("Listing Type", non_blank(input.listing_type.as_deref()))
            .render();

        PromptSpec::new(system_prompt(ROLE, &PRICE_PREDICTION_SCHEMA, &[]), user)
    }
}

fn non_empty_list(items: &[String]) -> Option<String> {
    let kept: Vec<&str> = items.iter().filter_map(|a| non_blank(Some(a.as_str()))).collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(", "))
    }
}

/// Predict the price of one listing.
pub async fn predict_price(
    client: &GenerationClient,
    input: &PricePredictionInput,
) -> Result<Extracted<PricePrediction>> {
    super::run::<PricePredictor>(client, input).await
}
