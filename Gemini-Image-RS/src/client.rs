use generation_queue::{GenerationCall, GeneratorError, ImageGenerator};
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::error::Result;
use crate::request::build_request_body;
use crate::response::{classify_status, parse_generate_response};

/// [`ImageGenerator`] backed by the Gemini `generateContent` API.
///
/// Each call is a single HTTP request; retries and backoff belong to the
/// orchestrator. The request is raced against the cancellation token and
/// dropped as soon as it fires.
///
/// # Example
/// ```no_run
/// use gemini_image_rs::{GeminiConfig, GeminiImageClient};
/// use generation_queue::{GenerationRequest, Orchestrator};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GeminiImageClient::new(GeminiConfig::from_env()?)?;
/// let orchestrator = Orchestrator::builder(client).build();
/// orchestrator.submit(GenerationRequest::new("a red bicycle"))?;
/// orchestrator.wait_until_idle().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeminiImageClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiImageClient {
    /// Create a client whose HTTP timeout follows `config.timeout`.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn send(&self, call: &GenerationCall<'_>) -> std::result::Result<Vec<u8>, GeneratorError> {
        let url = self.config.generate_url(call.config.model);
        let body = build_request_body(call);
        debug!(
            url = %url,
            images = call.images.len(),
            ratio = %call.config.aspect_ratio,
            "sending Gemini generateContent request"
        );

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Network(format!("Cannot reach Gemini API: {}", e)))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GeneratorError::Network(format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_status(
                status.as_u16(),
                &String::from_utf8_lossy(&bytes),
            ));
        }

        let json: Value = serde_json::from_slice(&bytes).map_err(|e| {
            GeneratorError::MalformedResponse(format!("Failed to parse Gemini response: {}", e))
        })?;
        parse_generate_response(&json)
    }
}

impl ImageGenerator for GeminiImageClient {
    async fn generate(
        &self,
        call: GenerationCall<'_>,
        cancel: CancellationToken,
    ) -> std::result::Result<Vec<u8>, GeneratorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GeneratorError::Cancelled),
            result = self.send(&call) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation_queue::ImageModel;

    #[test]
    fn test_client_keeps_config() {
        let client = GeminiImageClient::new(
            GeminiConfig::new("secret").with_endpoint("http://127.0.0.1:1/v1beta"),
        )
        .unwrap();
        assert_eq!(client.config().api_key, "secret");
        assert_eq!(
            client.config().generate_url(ImageModel::Pro),
            "http://127.0.0.1:1/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn test_cancelled_call_returns_immediately() {
        let client = GeminiImageClient::new(
            GeminiConfig::new("secret").with_endpoint("http://127.0.0.1:1/v1beta"),
        )
        .unwrap();
        let config = generation_queue::CallConfig {
            aspect_ratio: generation_queue::AspectRatio::Auto,
            seed: None,
            model: ImageModel::Standard,
            resolution: generation_queue::Resolution::OneK,
            negative_prompt: None,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let call = GenerationCall {
            prompt: "x".into(),
            images: &[],
            config: &config,
        };
        assert_eq!(
            client.generate(call, cancel).await,
            Err(GeneratorError::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = GeminiImageClient::new(
            GeminiConfig::new("secret").with_endpoint("http://127.0.0.1:1/v1beta"),
        )
        .unwrap();
        let config = generation_queue::CallConfig {
            aspect_ratio: generation_queue::AspectRatio::Auto,
            seed: None,
            model: ImageModel::Standard,
            resolution: generation_queue::Resolution::OneK,
            negative_prompt: None,
        };
        let call = GenerationCall {
            prompt: "x".into(),
            images: &[],
            config: &config,
        };
        let err = client
            .generate(call, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Network(_)), "{:?}", err);
    }
}
