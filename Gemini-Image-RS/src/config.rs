use std::time::Duration;

use generation_queue::ImageModel;

use crate::error::{GeminiError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base, without a trailing slash.
    pub endpoint: String,
    pub api_key: String,
    /// Per-request HTTP timeout. Expiry surfaces as a network error.
    pub timeout: Duration,
    /// Model id used for [`ImageModel::Standard`].
    pub standard_model: String,
    /// Model id used for [`ImageModel::Pro`].
    pub pro_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(120),
            standard_model: ImageModel::Standard.api_id().to_string(),
            pro_model: ImageModel::Pro.api_id().to_string(),
        }
    }

    /// Read the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Self::new)
            .ok_or(GeminiError::MissingApiKey)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the upstream model id for one tier.
    pub fn with_model(mut self, model: ImageModel, id: impl Into<String>) -> Self {
        match model {
            ImageModel::Standard => self.standard_model = id.into(),
            ImageModel::Pro => self.pro_model = id.into(),
        }
        self
    }

    pub fn model_id(&self, model: ImageModel) -> &str {
        match model {
            ImageModel::Standard => &self.standard_model,
            ImageModel::Pro => &self.pro_model,
        }
    }

    /// `generateContent` URL for a model tier.
    pub fn generate_url(&self, model: ImageModel) -> String {
        let id = self.model_id(model);
        let path = id.strip_prefix("models/").unwrap_or(id);
        format!("{}/models/{}:generateContent", self.endpoint, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url() {
        let config = GeminiConfig::new("key").with_endpoint("http://localhost:9000/v1beta/");
        assert_eq!(
            config.generate_url(ImageModel::Standard),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_model_override_accepts_prefixed_ids() {
        let config = GeminiConfig::new("key").with_model(ImageModel::Pro, "models/custom-image");
        assert_eq!(config.model_id(ImageModel::Pro), "models/custom-image");
        assert!(config
            .generate_url(ImageModel::Pro)
            .ends_with("/models/custom-image:generateContent"));
    }
}
