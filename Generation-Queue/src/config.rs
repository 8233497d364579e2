use std::time::Duration;

use image_normalizer::NormalizeOptions;

use crate::retry::RetryPolicy;

/// Configuration for the generation orchestrator.
///
/// Use [`OrchestratorConfig::builder()`] for ergonomic construction, or
/// [`OrchestratorConfig::default()`] for the tuning used against the hosted
/// Gemini image models (5 attempts, 300ms/500ms backoff bases).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Total attempts per image, including the first call.
    pub max_attempts: u32,

    /// Backoff base for content-filter false positives (doubles per attempt).
    pub filter_backoff_base: Duration,

    /// Backoff base for overload and network failures (doubles per attempt).
    pub generic_backoff_base: Duration,

    /// Upper bound on `num_images` for a single request.
    pub max_images_per_request: u32,

    /// Upper bound on reference images, character identities included.
    pub max_reference_images: usize,

    /// Longer side of generated thumbnails.
    pub thumbnail_max_side: u32,

    /// Options for the post-processing pipeline.
    pub normalize: NormalizeOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            filter_backoff_base: Duration::from_millis(300),
            generic_backoff_base: Duration::from_millis(500),
            max_images_per_request: 2,
            max_reference_images: 14,
            thumbnail_max_side: 256,
            normalize: NormalizeOptions::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            filter_backoff_base: self.filter_backoff_base,
            generic_backoff_base: self.generic_backoff_base,
        }
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// Set the total number of attempts per image (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    /// Set the two backoff bases: content-filter stops and generic failures.
    pub fn with_backoff(mut self, filter_base: Duration, generic_base: Duration) -> Self {
        self.config.filter_backoff_base = filter_base;
        self.config.generic_backoff_base = generic_base;
        self
    }

    /// Set the maximum number of images a single request may ask for.
    pub fn with_max_images_per_request(mut self, max: u32) -> Self {
        self.config.max_images_per_request = max.max(1);
        self
    }

    /// Set the maximum number of reference images per request.
    pub fn with_max_reference_images(mut self, max: usize) -> Self {
        self.config.max_reference_images = max;
        self
    }

    /// Set the longer side of generated thumbnails.
    pub fn with_thumbnail_max_side(mut self, side: u32) -> Self {
        self.config.thumbnail_max_side = side.max(1);
        self
    }

    /// Replace the normalization options.
    pub fn with_normalize_options(mut self, options: NormalizeOptions) -> Self {
        self.config.normalize = options;
        self
    }

    /// Build the final [`OrchestratorConfig`].
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.filter_backoff_base, Duration::from_millis(300));
        assert_eq!(config.generic_backoff_base, Duration::from_millis(500));
        assert_eq!(config.max_reference_images, 14);
        assert_eq!(config.normalize.max_long_side, 2048);
    }

    #[test]
    fn test_builder_overrides() {
        let config = OrchestratorConfig::builder()
            .with_max_attempts(0)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(20))
            .with_max_images_per_request(4)
            .with_thumbnail_max_side(128)
            .build();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.filter_backoff_base, Duration::from_millis(10));
        assert_eq!(config.generic_backoff_base, Duration::from_millis(20));
        assert_eq!(config.max_images_per_request, 4);
        assert_eq!(config.thumbnail_max_side, 128);
    }
}
