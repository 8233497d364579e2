use std::fmt;
use std::str::FromStr;

use base64::Engine;
use image_normalizer::AspectRatio;
use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::error::GenerationError;

/// Current time as an RFC 3339 string with millisecond precision.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Image bytes travelling in as reference material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlob {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageBlob {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Wrap PNG bytes.
    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }
}

/// Model tier. `Pro` trades latency for fidelity and is always dispatched
/// sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageModel {
    #[default]
    Standard,
    Pro,
}

impl ImageModel {
    /// Upstream model identifier.
    pub fn api_id(&self) -> &'static str {
        match self {
            ImageModel::Standard => "gemini-2.5-flash-image",
            ImageModel::Pro => "gemini-3-pro-image-preview",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageModel::Standard => "standard",
            ImageModel::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(ImageModel::Standard),
            "pro" => Some(ImageModel::Pro),
            _ => None,
        }
    }
}

/// Output resolution selector sent to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Resolution::OneK),
            "2K" => Ok(Resolution::TwoK),
            "4K" => Ok(Resolution::FourK),
            other => Err(GenerationError::InvalidRequest(format!(
                "unknown resolution '{}'",
                other
            ))),
        }
    }
}

/// Studio/style settings chosen in the UI. Every field is optional and is
/// only interpreted by the [`PromptComposer`](crate::PromptComposer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    pub preset: Option<String>,
    pub lighting: Option<String>,
    pub camera: Option<String>,
    pub mood: Option<String>,
}

impl StudioConfig {
    /// Non-empty fields in declaration order.
    pub fn fragments(&self) -> Vec<&str> {
        [&self.preset, &self.lighting, &self.camera, &self.mood]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// A saved character identity whose images ride along as extra references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterReference {
    pub name: String,
    pub images: Vec<ImageBlob>,
}

/// One desired generation batch. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: Option<u32>,
    pub aspect_ratio: AspectRatio,
    pub num_images: u32,
    pub model: ImageModel,
    pub resolution: Resolution,
    pub reference_images: Vec<ImageBlob>,
    pub style_image: Option<ImageBlob>,
    pub structure_image: Option<ImageBlob>,
    pub characters: Vec<CharacterReference>,
    pub precise_fidelity: bool,
    pub auto_enhance: bool,
    pub studio: StudioConfig,
}

impl GenerationRequest {
    /// A single-image, standard-tier request with `Auto` aspect ratio.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            seed: None,
            aspect_ratio: AspectRatio::Auto,
            num_images: 1,
            model: ImageModel::Standard,
            resolution: Resolution::OneK,
            reference_images: Vec::new(),
            style_image: None,
            structure_image: None,
            characters: Vec::new(),
            precise_fidelity: false,
            auto_enhance: false,
            studio: StudioConfig::default(),
        }
    }

    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = negative.into();
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn with_num_images(mut self, count: u32) -> Self {
        self.num_images = count;
        self
    }

    pub fn with_model(mut self, model: ImageModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Append a reference image (order is preserved).
    pub fn with_reference(mut self, image: ImageBlob) -> Self {
        self.reference_images.push(image);
        self
    }

    pub fn with_style_image(mut self, image: ImageBlob) -> Self {
        self.style_image = Some(image);
        self
    }

    pub fn with_structure_image(mut self, image: ImageBlob) -> Self {
        self.structure_image = Some(image);
        self
    }

    pub fn with_character(mut self, character: CharacterReference) -> Self {
        self.characters.push(character);
        self
    }

    pub fn with_precise_fidelity(mut self, enabled: bool) -> Self {
        self.precise_fidelity = enabled;
        self
    }

    pub fn with_auto_enhance(mut self, enabled: bool) -> Self {
        self.auto_enhance = enabled;
        self
    }

    pub fn with_studio(mut self, studio: StudioConfig) -> Self {
        self.studio = studio;
        self
    }

    /// No references, no style image and a blank prompt: nothing to generate.
    pub fn is_empty(&self) -> bool {
        self.reference_images.is_empty()
            && self.style_image.is_none()
            && self.prompt.trim().is_empty()
    }

    /// Reference images plus every character identity image.
    pub fn total_references(&self) -> usize {
        self.reference_images.len()
            + self
                .characters
                .iter()
                .map(|c| c.images.len())
                .sum::<usize>()
    }

    /// Ordered image list sent to the generator: references first, then
    /// character identities, then style and structure guides.
    pub fn dispatch_images(&self) -> Vec<ImageBlob> {
        self.reference_images
            .iter()
            .chain(self.characters.iter().flat_map(|c| c.images.iter()))
            .chain(self.style_image.iter())
            .chain(self.structure_image.iter())
            .cloned()
            .collect()
    }

    /// Check the bounds configured for this orchestrator.
    pub fn validate(&self, config: &OrchestratorConfig) -> Result<(), GenerationError> {
        if self.num_images == 0 || self.num_images > config.max_images_per_request {
            return Err(GenerationError::InvalidRequest(format!(
                "num_images must be between 1 and {} (got {})",
                config.max_images_per_request, self.num_images
            )));
        }
        if !self.aspect_ratio.is_supported() {
            return Err(GenerationError::InvalidRequest(format!(
                "unsupported aspect ratio {}",
                self.aspect_ratio
            )));
        }
        let refs = self.total_references();
        if refs > config.max_reference_images {
            return Err(GenerationError::InvalidRequest(format!(
                "at most {} reference images are allowed (got {})",
                config.max_reference_images, refs
            )));
        }
        Ok(())
    }
}

/// A request deferred while another job holds the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTask {
    pub id: String,
    pub request: GenerationRequest,
    /// RFC 3339 timestamp of when the task was queued.
    pub created_at: String,
}

impl QueuedTask {
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request,
            created_at: timestamp(),
        }
    }
}

/// One successfully generated and normalized image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// JPEG preview.
    #[serde(with = "base64_bytes")]
    pub thumbnail: Vec<u8>,
    /// Prompt actually sent, including any batch variation clause.
    pub prompt: String,
    pub negative_prompt: String,
    pub aspect_ratio: AspectRatio,
    pub seed: u32,
    pub model: ImageModel,
    pub resolution: Resolution,
    pub created_at: String,
    pub favorite: bool,
}

impl GenerationResult {
    pub fn data_url(&self) -> String {
        data_url(&self.mime_type, &self.image)
    }

    pub fn thumbnail_data_url(&self) -> String {
        data_url("image/jpeg", &self.thumbnail)
    }
}

/// Per-call parameters for the remote generator.
#[derive(Debug, Clone, PartialEq)]
pub struct CallConfig {
    /// Ratio hint; `Auto` means "let the model decide".
    pub aspect_ratio: AspectRatio,
    pub seed: Option<u32>,
    pub model: ImageModel,
    pub resolution: Resolution,
    pub negative_prompt: Option<String>,
}

/// A single remote call: the decorated prompt plus borrowed images/config.
#[derive(Debug, Clone)]
pub struct GenerationCall<'a> {
    pub prompt: String,
    pub images: &'a [ImageBlob],
    pub config: &'a CallConfig,
}

/// What [`Orchestrator::submit`](crate::Orchestrator::submit) did with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SubmitOutcome {
    /// Nothing to generate; the request was dropped.
    Ignored,
    /// The slot was free and the job is running.
    Started { job_id: String },
    /// The slot was busy; the task waits at `position` (1-based).
    Queued { task_id: String, position: usize },
}

pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
