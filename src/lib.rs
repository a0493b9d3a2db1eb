//! # Estate AI
//!
//! Structured-extraction core for the AI helpers of a real-estate
//! marketplace: price prediction, neighborhood analysis, a property chatbot
//! and recommendations with search-filter extraction.
//!
//! Each helper is a **flow**: typed parameters go in, a prompt with an
//! inlined JSON contract goes to a chat-completions backend, and the free-form
//! reply comes back as a schema-validated, typed payload, or as a typed
//! [`FlowError`] saying exactly which step failed.
//!
//! ## Core Concepts
//!
//! - **[`PromptSpec`]**: system prompt, user prompt and prior turns for one
//!   call. Built by pure functions in [`prompt`].
//! - **[`GenerationClient`]**: one request/response exchange per call, with
//!   a credential check, timeout and cancellation. Never retries.
//! - **[`extract`](extract::extract)**: locate, parse and validate the JSON
//!   object in a reply against a [`UseCaseSchema`].
//! - **[`flows`]**: the four use cases, run through [`flows::run`].
//! - **[`api::dispatch`]**: maps an authenticated JSON request to a status
//!   code and JSON body.
//!
//! ## Quick Start
//!
//! ```no_run
//! use estate_ai::flows::price::{predict_price, PricePredictionInput};
//! use estate_ai::GenerationClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads SARVAM_API_KEY (and optional overrides) from the environment.
//!     let client = GenerationClient::from_env()?;
//!
//!     let input = PricePredictionInput {
//!         location: "Koramangala, Bangalore".into(),
//!         property_type: "APARTMENT".into(),
//!         bedrooms: 3,
//!         bathrooms: 2,
//!         area_sqft: 1400.0,
//!         amenities: vec!["Gym".into()],
//!         listing_type: None,
//!     };
//!
//!     let out = predict_price(&client, &input).await?;
//!     println!("{} ({}% confidence)", out.payload.estimated_price, out.payload.confidence);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod flows;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use backend::{Backend, MockBackend, SarvamBackend};
pub use client::{CancelHandle, GenerationClient, GenerationClientBuilder};
pub use config::ClientConfig;
pub use error::{ErrorKind, FlowError, Result};
pub use extract::{Extracted, Strategy};
pub use flows::{Flow, FlowRequest, FlowResponse, FlowState};
pub use prompt::{PromptSpec, Turn, TurnRole, UseCase};
pub use retry::{retry_with_backoff, BackoffConfig};
pub use schema::UseCaseSchema;
