use thiserror::Error;

/// Errors raised while configuring the Gemini client.
///
/// Failures of individual generation calls are reported as
/// [`GeneratorError`](generation_queue::GeneratorError) instead.
#[derive(Error, Debug)]
pub enum GeminiError {
    /// No API key in the environment.
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GeminiError>;
