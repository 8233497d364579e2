use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GenerationError, GeneratorError, RetryClass};
use crate::types::{CallConfig, GenerationCall, ImageBlob};
use crate::ImageGenerator;

/// Clauses rotated onto the prompt from the second retry on.
pub const SOFTENING_CLAUSES: [&str; 3] = [
    "as digital art",
    "in a professional photoshoot",
    "cinematic composition",
];

/// Attempt ceiling and exponential backoff bases for one image slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub filter_backoff_base: Duration,
    pub generic_backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt` (0-based),
    /// or `None` if the failure must not be retried.
    pub fn backoff(&self, class: RetryClass, attempt: u32) -> Option<Duration> {
        let factor = 2u32.saturating_pow(attempt);
        match class {
            RetryClass::FilterFalsePositive => Some(self.filter_backoff_base.saturating_mul(factor)),
            RetryClass::Transient => Some(self.generic_backoff_base.saturating_mul(factor)),
            RetryClass::Terminal => None,
        }
    }
}

/// The prompt for a given attempt, rebuilt from the base prompt every time so
/// softening clauses never accumulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptContext {
    pub attempt: u32,
    pub prompt: String,
}

impl AttemptContext {
    pub fn new(base_prompt: &str, attempt: u32) -> Self {
        let prompt = match attempt.checked_sub(2) {
            Some(n) => {
                let clause = SOFTENING_CLAUSES[n as usize % SOFTENING_CLAUSES.len()];
                let base = base_prompt.trim_end();
                if base.is_empty() {
                    clause.to_string()
                } else {
                    format!("{}, {}", base, clause)
                }
            }
            None => base_prompt.to_string(),
        };
        Self { attempt, prompt }
    }
}

/// Call the generator until it succeeds, fails terminally, runs out of
/// attempts, or `cancel` fires.
///
/// Both the remote call and the backoff sleep race against the token, so a
/// cancellation is observed immediately instead of after the next attempt.
pub async fn generate_with_retry<G>(
    generator: &G,
    policy: &RetryPolicy,
    base_prompt: &str,
    images: &[ImageBlob],
    config: &CallConfig,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, GenerationError>
where
    G: ImageGenerator,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let ctx = AttemptContext::new(base_prompt, attempt);
        debug!(attempt, prompt = %ctx.prompt, "calling image generator");
        let call = GenerationCall {
            prompt: ctx.prompt,
            images,
            config,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GeneratorError::Cancelled),
            result = generator.generate(call, cancel.clone()) => result,
        };

        let err = match outcome {
            Ok(bytes) if bytes.is_empty() => {
                GeneratorError::MalformedResponse("generator returned no image data".into())
            }
            Ok(bytes) => {
                if attempt > 0 {
                    info!(attempt, "image generated after retry");
                }
                return Ok(bytes);
            }
            Err(err) => err,
        };

        let Some(delay) = policy.backoff(err.retry_class(), attempt) else {
            warn!(attempt, error = %err, "non-retryable generator failure");
            return Err(err.into());
        };

        if attempt + 1 >= max_attempts {
            last_error = Some(err);
            break;
        }

        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "generator failure, retrying"
        );
        last_error = Some(err);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    Err(GenerationError::RetriesExhausted {
        attempts: max_attempts,
        last: last_error.unwrap_or_else(|| {
            GeneratorError::MalformedResponse("no attempt was made".into())
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            filter_backoff_base: Duration::from_millis(300),
            generic_backoff_base: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let p = policy();
        assert_eq!(
            p.backoff(RetryClass::FilterFalsePositive, 0),
            Some(Duration::from_millis(300))
        );
        assert_eq!(
            p.backoff(RetryClass::FilterFalsePositive, 3),
            Some(Duration::from_millis(2400))
        );
        assert_eq!(
            p.backoff(RetryClass::Transient, 2),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(p.backoff(RetryClass::Terminal, 0), None);
    }

    #[test]
    fn test_first_retry_keeps_prompt() {
        assert_eq!(AttemptContext::new("a fox", 0).prompt, "a fox");
        assert_eq!(AttemptContext::new("a fox", 1).prompt, "a fox");
    }

    #[test]
    fn test_softening_rotates_without_stacking() {
        assert_eq!(AttemptContext::new("a fox", 2).prompt, "a fox, as digital art");
        assert_eq!(
            AttemptContext::new("a fox", 3).prompt,
            "a fox, in a professional photoshoot"
        );
        assert_eq!(
            AttemptContext::new("a fox", 4).prompt,
            "a fox, cinematic composition"
        );
        assert_eq!(AttemptContext::new("a fox", 5).prompt, "a fox, as digital art");
    }

    #[test]
    fn test_softening_on_blank_prompt() {
        assert_eq!(AttemptContext::new("", 2).prompt, "as digital art");
    }
}
