//! # gemini-image-rs
//!
//! Gemini image-model backend for [`generation_queue`].
//!
//! [`GeminiImageClient`] implements [`ImageGenerator`](generation_queue::ImageGenerator):
//! it turns a [`GenerationCall`](generation_queue::GenerationCall) into a
//! `generateContent` request, pulls the first inline image out of the
//! response and classifies failures so the orchestrator knows which ones to
//! retry:
//!
//! | Upstream signal                                   | Classification      |
//! |---------------------------------------------------|---------------------|
//! | HTTP 429 / 500 / 502 / 503 / 504                  | `TransientOverload` |
//! | finish reason `RECITATION`                        | `FilterRecitation`  |
//! | finish reason `OTHER`                             | `FilterOther`       |
//! | `SAFETY`, `IMAGE_SAFETY`, `PROHIBITED_CONTENT`, `BLOCKLIST`, `SPII`, prompt `blockReason` | `SafetyBlock` |
//! | no image data, other HTTP errors                  | `MalformedResponse` |
//! | transport failure or timeout                      | `Network`           |
//!
//! ## Quick Start
//!
//! ```no_run
//! use gemini_image_rs::{GeminiConfig, GeminiImageClient};
//! use generation_queue::{GenerationRequest, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GeminiImageClient::new(GeminiConfig::from_env()?)?;
//! let orchestrator = Orchestrator::builder(client).build();
//! orchestrator.submit(GenerationRequest::new("a lighthouse at dusk"))?;
//! orchestrator.wait_until_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use client::GeminiImageClient;
pub use config::{GeminiConfig, DEFAULT_ENDPOINT};
pub use error::{GeminiError, Result};
pub use request::build_request_body;
pub use response::{classify_finish_reason, classify_status, parse_generate_response};
