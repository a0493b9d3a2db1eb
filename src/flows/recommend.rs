//! Property recommendations plus search-filter extraction.
//!
//! Besides the recommendation list, the model maps phrases like "3 BHK" or
//! "for rent" onto the listing search vocabulary. That mapping is advisory:
//! a malformed `filters` object, or any single bad field in it, is dropped
//! with a warning and never fails the call.

use serde::{Deserialize, Serialize};

use super::Flow;
use crate::client::GenerationClient;
use crate::error::{FlowError, Result};
use crate::extract::Extracted;
use crate::prompt::{non_blank, system_prompt, LabeledLines, PromptSpec, UseCase};
use crate::schema::{Field, Kind, UseCaseSchema};

const ROLE: &str = "You are a real estate expert. Based on the following preferences, provide property recommendations and EXTRACT structured filters for the application.";

const GUIDANCE: &[&str] = &[
    "listingType should be \"FOR_SALE\" or \"FOR_RENT\".",
    "type should be \"APARTMENT\", \"HOUSE\", or \"VILLA\".",
    "bedrooms should be \"1\", \"2\", \"3\", or \"4\" (for 4+).",
    "",
    "Example filters mapping:",
    "\"3 BHK\" -> bedrooms: \"3\"",
    "\"rent\" -> listingType: \"FOR_RENT\"",
    "\"buy\" -> listingType: \"FOR_SALE\"",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationInput {
    pub preferences: String,
    /// Maximum budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
    /// Empty when the model supplied none or nothing usable.
    #[serde(default, skip_serializing_if = "SearchFilters::is_empty")]
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub suggestion: String,
    pub reasoning: String,
    pub price_range: String,
    /// 0-100.
    pub match_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingType {
    ForSale,
    ForRent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertyCategory {
    Apartment,
    House,
    Villa,
}

/// Bedroom filter bucket; `"4"` means four or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BedroomFilter {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    FourPlus,
}

/// Listing search filters in the application's own vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<PropertyCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<BedroomFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self == &SearchFilters::default()
    }
}

static RECOMMENDATION_FIELDS: [Field; 4] = [
    Field::required("suggestion", Kind::String),
    Field::required("reasoning", Kind::String),
    Field::required("priceRange", Kind::String),
    Field::required("matchScore", Kind::range(0.0, 100.0)),
];

static RECOMMENDATION: Kind = Kind::Object(&RECOMMENDATION_FIELDS);

// Token lists mirror the serde names of the filter enums above.
static FILTER_FIELDS: [Field; 5] = [
    Field::optional("search", Kind::String).advisory(),
    Field::optional("listingType", Kind::OneOf(&["FOR_SALE", "FOR_RENT"])).advisory(),
    Field::optional("type", Kind::OneOf(&["APARTMENT", "HOUSE", "VILLA"])).advisory(),
    Field::optional("bedrooms", Kind::OneOf(&["1", "2", "3", "4"])).advisory(),
    Field::optional("maxPrice", Kind::String).advisory(),
];

static FIELDS: [Field; 3] = [
    Field::required(
        "recommendations",
        Kind::Array {
            items: &RECOMMENDATION,
            expected: None,
        },
    ),
    Field::required("summary", Kind::String),
    Field::optional("filters", Kind::Object(&FILTER_FIELDS)).advisory(),
];

pub static RECOMMENDATION_SCHEMA: UseCaseSchema = UseCaseSchema {
    use_case: UseCase::Recommendation,
    fields: &FIELDS,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyRecommender;

impl Flow for PropertyRecommender {
    type Input = RecommendationInput;
    type Output = Recommendations;

    const USE_CASE: UseCase = UseCase::Recommendation;

    fn schema() -> &'static UseCaseSchema {
        &RECOMMENDATION_SCHEMA
    }

    fn validate(input: &RecommendationInput) -> Result<()> {
        if non_blank(Some(input.preferences.as_str())).is_none() {
            return Err(FlowError::invalid_input("preferences", "must not be empty"));
        }
        match input.budget {
            Some(b) if !b.is_finite() || b < 0.0 => Err(FlowError::invalid_input(
                "budget",
                "must be a non-negative number",
            )),
            _ => Ok(()),
        }
    }

    fn prompt(input: &RecommendationInput) -> Result<PromptSpec> {
        let user = LabeledLines::new()
            .line("User Preferences", input.preferences.trim())
            .optional("Budget", input.budget)
            .optional("Preferred Location", non_blank(input.location.as_deref()))
            .optional("Property Type", non_blank(input.property_type.as_deref()))
            .render();

        PromptSpec::new(system_prompt(ROLE, &RECOMMENDATION_SCHEMA, GUIDANCE), user)
    }
}

pub async fn recommend(
    client: &GenerationClient,
    input: &RecommendationInput,
) -> Result<Extracted<Recommendations>> {
    super::run::<PropertyRecommender>(client, input).await
}
