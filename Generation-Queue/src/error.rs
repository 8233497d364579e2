use thiserror::Error;

/// How the retry loop treats a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Content-filter stops that fire inconsistently on identical input.
    FilterFalsePositive,
    /// Overload or transport failures without a specific classification.
    Transient,
    /// Never retried.
    Terminal,
}

/// Classified failure reported by an [`ImageGenerator`](crate::ImageGenerator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Image service is overloaded: {0}")]
    TransientOverload(String),

    #[error("Blocked as recitation of protected content")]
    FilterRecitation,

    #[error("Stopped by content policy: {0}")]
    FilterOther(String),

    #[error("Blocked by safety filter: {0}")]
    SafetyBlock(String),

    #[error("Malformed response from image service: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request was cancelled")]
    Cancelled,
}

impl GeneratorError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            GeneratorError::FilterRecitation | GeneratorError::FilterOther(_) => {
                RetryClass::FilterFalsePositive
            }
            GeneratorError::TransientOverload(_) | GeneratorError::Network(_) => {
                RetryClass::Transient
            }
            GeneratorError::SafetyBlock(_)
            | GeneratorError::MalformedResponse(_)
            | GeneratorError::Cancelled => RetryClass::Terminal,
        }
    }
}

/// Errors surfaced across the orchestrator boundary.
///
/// The `Display` output is the human-readable message handed to the
/// presentation layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Generator(GeneratorError),

    #[error("Generation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: GeneratorError },

    #[error("Image normalization failed: {0}")]
    Normalize(String),

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("History store error: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

impl From<GeneratorError> for GenerationError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Cancelled => GenerationError::Cancelled,
            other => GenerationError::Generator(other),
        }
    }
}

impl From<image_normalizer::NormalizeError> for GenerationError {
    fn from(err: image_normalizer::NormalizeError) -> Self {
        GenerationError::Normalize(err.to_string())
    }
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        GenerationError::Store(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classes() {
        assert_eq!(
            GeneratorError::FilterRecitation.retry_class(),
            RetryClass::FilterFalsePositive
        );
        assert_eq!(
            GeneratorError::FilterOther("OTHER".into()).retry_class(),
            RetryClass::FilterFalsePositive
        );
        assert_eq!(
            GeneratorError::TransientOverload("503".into()).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            GeneratorError::Network("reset".into()).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            GeneratorError::SafetyBlock("IMAGE_SAFETY".into()).retry_class(),
            RetryClass::Terminal
        );
        assert_eq!(
            GeneratorError::MalformedResponse("no parts".into()).retry_class(),
            RetryClass::Terminal
        );
    }

    #[test]
    fn test_exhausted_message_names_attempts_and_reason() {
        let err = GenerationError::RetriesExhausted {
            attempts: 5,
            last: GeneratorError::FilterRecitation,
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempts"));
        assert!(msg.contains("recitation"));
    }

    #[test]
    fn test_cancelled_generator_error_maps_to_cancelled() {
        let err: GenerationError = GeneratorError::Cancelled.into();
        assert_eq!(err, GenerationError::Cancelled);
    }
}
