use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::types::{GenerationResult, ImageModel, Resolution};
use image_normalizer::AspectRatio;

/// History row without the full-size image, for gallery listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub aspect_ratio: AspectRatio,
    pub seed: u32,
    pub model: ImageModel,
    pub resolution: Resolution,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    #[serde(with = "crate::types::base64_bytes")]
    pub thumbnail: Vec<u8>,
    pub favorite: bool,
    pub created_at: String,
}

impl From<&GenerationResult> for HistoryEntry {
    fn from(result: &GenerationResult) -> Self {
        Self {
            id: result.id.clone(),
            prompt: result.prompt.clone(),
            negative_prompt: result.negative_prompt.clone(),
            aspect_ratio: result.aspect_ratio,
            seed: result.seed,
            model: result.model,
            resolution: result.resolution,
            width: result.width,
            height: result.height,
            mime_type: result.mime_type.clone(),
            thumbnail: result.thumbnail.clone(),
            favorite: result.favorite,
            created_at: result.created_at.clone(),
        }
    }
}

/// Persistence for generated images.
///
/// Calls are synchronous and short; the orchestrator invokes them from
/// blocking-friendly contexts.
pub trait ResultStore: Send + Sync + 'static {
    /// Insert or replace a result.
    fn put(&self, result: &GenerationResult) -> Result<(), GenerationError>;

    /// Fetch a full result, image bytes included.
    fn get(&self, id: &str) -> Result<Option<GenerationResult>, GenerationError>;

    /// Newest first, at most `limit` entries.
    fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, GenerationError>;

    /// Returns `false` if no result has this id.
    fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool, GenerationError>;

    /// Delete by id, returning how many rows went away.
    fn delete_many(&self, ids: &[String]) -> Result<usize, GenerationError>;

    /// Keep the newest `keep` results plus every favorite; delete the rest.
    fn prune(&self, keep: usize) -> Result<usize, GenerationError>;
}
