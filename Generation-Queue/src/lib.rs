//! # Generation Queue
//!
//! Single-flight orchestrator for AI image generation.
//!
//! ## Features
//!
//! - At most one generation job in flight; later requests wait in a FIFO queue
//! - Bounded retry with exponential backoff and prompt softening for
//!   content-filter false positives
//! - Sequential or parallel dispatch of multi-image batches
//! - Cooperative cancellation that also clears the queue
//! - Border stripping and aspect-ratio normalization of every result
//! - Optional SQLite history of generated images
//! - Lifecycle events for a presentation layer (Tauri behind the `tauri` feature)
//!
//! ## Quick Start
//!
//! 1. Implement [`ImageGenerator`] for your model backend
//! 2. Build an [`Orchestrator`] with [`Orchestrator::builder()`]
//! 3. Call [`Orchestrator::submit()`] with a [`GenerationRequest`]
//! 4. Listen for [`OrchestratorEvent`]s or await [`Orchestrator::wait_until_idle()`]
//!
//! See the `examples/` directory for complete usage examples.

pub mod compose;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod store;
pub mod types;

pub use compose::PassthroughComposer;
pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use db::SqliteResultStore;
pub use dispatch::DispatchMode;
pub use error::{GenerationError, GeneratorError, RetryClass};
pub use events::{ChannelSink, EventSink, NoopSink, OrchestratorEvent};
pub use image_normalizer::AspectRatio;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use retry::RetryPolicy;
pub use store::{HistoryEntry, ResultStore};
pub use types::{
    CallConfig, CharacterReference, GenerationCall, GenerationRequest, GenerationResult,
    ImageBlob, ImageModel, QueuedTask, Resolution, StudioConfig, SubmitOutcome,
};

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// A remote image model.
///
/// Implementations perform exactly one call per invocation and classify
/// failures into [`GeneratorError`]; retrying is the orchestrator's job.
/// Long-running implementations should watch `cancel` and return
/// [`GeneratorError::Cancelled`] once it fires.
///
/// # Example
///
/// ```ignore
/// use generation_queue::*;
///
/// struct Fixed(Vec<u8>);
///
/// impl ImageGenerator for Fixed {
///     async fn generate(
///         &self,
///         _call: GenerationCall<'_>,
///         _cancel: CancellationToken,
///     ) -> Result<Vec<u8>, GeneratorError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait ImageGenerator: Send + Sync + 'static {
    /// Produce one encoded image for `call`.
    fn generate(
        &self,
        call: GenerationCall<'_>,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<u8>, GeneratorError>> + Send;
}

impl<T: ImageGenerator> ImageGenerator for Arc<T> {
    fn generate(
        &self,
        call: GenerationCall<'_>,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<u8>, GeneratorError>> + Send {
        (**self).generate(call, cancel)
    }
}

/// Turns a request into the base prompt sent to the generator.
///
/// Enhancement services (LLM rewriting, studio presets) plug in here. The
/// default [`PassthroughComposer`] never rewrites the user's words.
pub trait PromptComposer: Send + Sync + 'static {
    fn compose(&self, request: &GenerationRequest) -> impl Future<Output = String> + Send;
}
