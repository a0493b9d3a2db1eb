//! Neighborhood analysis: ratings, highlights and price level for an area.

use serde::{Deserialize, Serialize};

use super::Flow;
use crate::client::GenerationClient;
use crate::error::{FlowError, Result};
use crate::extract::Extracted;
use crate::prompt::{non_blank, system_prompt, LabeledLines, PromptSpec, UseCase};
use crate::schema::{Field, Kind, UseCaseSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodInput {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodAnalysis {
    pub overview: String,
    pub ratings: Ratings,
    pub highlights: Vec<String>,
    pub considerations: Vec<String>,
    /// Free-form, e.g. `₹85L - ₹1.2Cr`.
    pub average_price: String,
}

/// Category ratings, each 1-10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub safety: f64,
    pub schools: f64,
    pub transportation: f64,
    pub shopping: f64,
    pub dining: f64,
    pub parks: f64,
    pub overall: f64,
}

const RATING: Kind = Kind::integer_range(1.0, 10.0);

static RATING_FIELDS: [Field; 7] = [
    Field::required("safety", RATING),
    Field::required("schools", RATING),
    Field::required("transportation", RATING),
    Field::required("shopping", RATING),
    Field::required("dining", RATING),
    Field::required("parks", RATING),
    Field::required("overall", RATING),
];

static FIELDS: [Field; 5] = [
    Field::required("overview", Kind::String),
    Field::required("ratings", Kind::Object(&RATING_FIELDS)),
    Field::required(
        "highlights",
        Kind::Array {
            items: &Kind::String,
            expected: Some((3, 5)),
        },
    ),
    Field::required(
        "considerations",
        Kind::Array {
            items: &Kind::String,
            expected: Some((2, 3)),
        },
    ),
    Field::required("averagePrice", Kind::String).note("e.g. \"₹85L - ₹1.2Cr\""),
];

pub static NEIGHBORHOOD_SCHEMA: UseCaseSchema = UseCaseSchema {
    use_case: UseCase::NeighborhoodAnalysis,
    fields: &FIELDS,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborhoodAnalyzer;

impl Flow for NeighborhoodAnalyzer {
    type Input = NeighborhoodInput;
    type Output = NeighborhoodAnalysis;

    const USE_CASE: UseCase = UseCase::NeighborhoodAnalysis;

    fn schema() -> &'static UseCaseSchema {
        &NEIGHBORHOOD_SCHEMA
    }

    fn validate(input: &NeighborhoodInput) -> Result<()> {
        match non_blank(Some(input.location.as_str())) {
            Some(_) => Ok(()),
            None => Err(FlowError::invalid_input("location", "must not be empty")),
        }
    }

    fn prompt(input: &NeighborhoodInput) -> Result<PromptSpec> {
        let goal = match non_blank(input.property_type.as_deref()) {
            Some(kind) => format!("find a {} in", kind),
            None => "move to".to_string(),
        };
        let role = format!(
            "You are a neighborhood expert. Analyze the following area for someone looking to {} this location.",
            goal
        );
        let user = LabeledLines::new()
            .line("Location", input.location.trim())
            .render();

        PromptSpec::new(
            system_prompt(&role, &NEIGHBORHOOD_SCHEMA, &["All ratings are integers from 1 to 10."]),
            user,
        )
    }
}

pub async fn analyze_neighborhood(
    client: &GenerationClient,
    input: &NeighborhoodInput,
) -> Result<Extracted<NeighborhoodAnalysis>> {
    super::run::<NeighborhoodAnalyzer>(client, input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockReply;
    use crate::error::ErrorKind;
    use crate::extract::extract;
    use crate::flows::test_support::{fenced, mock_client};
    use serde_json::{json, Value};

    fn input(property_type: Option<&str>) -> NeighborhoodInput {
        NeighborhoodInput {
            location: "Indiranagar, Bangalore".into(),
            property_type: property_type.map(String::from),
        }
    }

    fn reply(highlights: usize) -> Value {
        json!({
            "overview": "Lively, central and well connected.",
            "ratings": {
                "safety": 8, "schools": 7, "transportation": 9, "shopping": 9,
                "dining": 10, "parks": 6, "overall": 8
            },
            "highlights": (0..highlights).map(|i| format!("highlight {}", i)).collect::<Vec<_>>(),
            "considerations": ["Traffic at peak hours", "High rents"],
            "averagePrice": "₹1.5Cr - ₹3Cr"
        })
    }

    #[test]
    fn test_role_phrase_follows_property_type() {
        let with_type = NeighborhoodAnalyzer::prompt(&input(Some("VILLA"))).unwrap();
        assert!(with_type
            .system_prompt()
            .contains("someone looking to find a VILLA in this location"));

        let without = NeighborhoodAnalyzer::prompt(&input(Some("  "))).unwrap();
        assert!(without
            .system_prompt()
            .contains("someone looking to move to this location"));
        assert_eq!(without.user_prompt(), "Location: Indiranagar, Bangalore");
    }

    #[test]
    fn test_system_prompt_lists_ratings_and_counts() {
        let spec = NeighborhoodAnalyzer::prompt(&input(None)).unwrap();
        let system = spec.system_prompt();
        assert!(system.contains(
            "- ratings (object with keys: safety, schools, transportation, shopping, dining, parks, overall)"
        ));
        assert!(system.contains("  - safety (integer, 1-10)"));
        assert!(system.contains("- highlights (array of strings, 3-5 items)"));
        assert!(system.contains("- considerations (array of strings, 2-3 items)"));
        assert!(system.contains("₹85L - ₹1.2Cr"));
    }

    #[test]
    fn test_blank_location_rejected() {
        let err = NeighborhoodAnalyzer::validate(&NeighborhoodInput {
            location: "".into(),
            property_type: None,
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_prompt_is_pure() {
        let a = NeighborhoodAnalyzer::prompt(&input(Some("VILLA"))).unwrap();
        let b = NeighborhoodAnalyzer::prompt(&input(Some("VILLA"))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fenced_round_trip() {
        let payload = NeighborhoodAnalysis {
            overview: "Leafy, with a \"quiet\" {residential} core.".into(),
            ratings: Ratings {
                safety: 8.0,
                schools: 7.0,
                transportation: 9.0,
                shopping: 9.0,
                dining: 10.0,
                parks: 6.0,
                overall: 8.0,
            },
            highlights: vec!["Metro access".into(), "Cafes".into(), "12th Main".into()],
            considerations: vec!["Traffic".into(), "High rents".into()],
            average_price: "₹1.5Cr - ₹3Cr".into(),
        };
        let raw = fenced(&serde_json::to_value(&payload).unwrap());
        let out = extract::<NeighborhoodAnalysis>(&raw, &NEIGHBORHOOD_SCHEMA).unwrap();
        assert_eq!(out.payload, payload);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_highlight_count_deviation_only_warns() {
        let raw = fenced(&reply(7));
        let out = extract::<NeighborhoodAnalysis>(&raw, &NEIGHBORHOOD_SCHEMA).unwrap();
        assert_eq!(out.payload.highlights.len(), 7);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].path, "highlights");
    }

    #[test]
    fn test_rating_out_of_range_is_fatal() {
        let mut value = reply(3);
        value["ratings"]["parks"] = json!(11);
        let err = extract::<NeighborhoodAnalysis>(&value.to_string(), &NEIGHBORHOOD_SCHEMA)
            .unwrap_err();
        match err {
            FlowError::SchemaValidation { key, .. } => assert_eq!(key, "ratings.parks"),
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_overall_rating_named() {
        let mut value = reply(4);
        value["ratings"]
            .as_object_mut()
            .unwrap()
            .remove("overall");
        let err = extract::<NeighborhoodAnalysis>(&value.to_string(), &NEIGHBORHOOD_SCHEMA)
            .unwrap_err();
        match err {
            FlowError::SchemaValidation { key, .. } => assert_eq!(key, "ratings.overall"),
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_fractional_rating_accepted_with_warning() {
        let mut value = reply(3);
        value["ratings"]["schools"] = json!(7.5);
        let out = extract::<NeighborhoodAnalysis>(&value.to_string(), &NEIGHBORHOOD_SCHEMA)
            .unwrap();
        assert_eq!(out.payload.ratings.schools, 7.5);
        assert!(out.warnings.iter().any(|w| w.path == "ratings.schools"));
    }

    #[tokio::test]
    async fn test_analyze_end_to_end() {
        let (client, _) = mock_client(vec![MockReply::Text(fenced(&reply(4)))]);
        let out = analyze_neighborhood(&client, &input(Some("APARTMENT")))
            .await
            .unwrap();
        assert_eq!(out.payload.ratings.dining, 10.0);
        assert_eq!(out.payload.average_price, "₹1.5Cr - ₹3Cr");
        assert!(out.warnings.is_empty());
    }
}
