//! # image-normalizer
//!
//! Deterministic post-processing for images returned by generative models.
//!
//! Upstream models occasionally pad their output with near-white frames and
//! rarely hit the requested aspect ratio exactly. [`normalize`] fixes both:
//!
//! 1. **Border detection**: scan inward from each edge, sampling every Nth
//!    pixel, while at least 80% of a row/column is near-white
//! 2. **Significance gate**: only strip borders if one side exceeds 3% of
//!    its dimension, so bright content is left alone
//! 3. **Center crop**: trim the longer dimension symmetrically when the
//!    content ratio is more than 1% off target
//! 4. **Resolution normalization**: longer side 2048px, shorter side never
//!    under 1024px
//! 5. **Lanczos3 resampling** and lossless PNG output
//!
//! `AspectRatio::Auto` bypasses the pipeline entirely.
//!
//! ## Quick Start
//!
//! ```no_run
//! use image_normalizer::{normalize, AspectRatio, NormalizeOptions};
//!
//! # fn example(raw: &[u8]) -> image_normalizer::Result<()> {
//! let ratio: AspectRatio = "16:9".parse()?;
//! let out = normalize(raw, ratio, &NormalizeOptions::default())?;
//! assert_eq!((out.width, out.height), (2048, 1152));
//! # Ok(())
//! # }
//! ```

pub mod border;
pub mod error;
pub mod geometry;
pub mod normalizer;
pub mod types;

pub use border::{content_rect, detect_borders};
pub use error::{NormalizeError, Result};
pub use geometry::{crop_to_ratio, output_dimensions};
pub use normalizer::{normalize, probe_dimensions, thumbnail};
pub use types::{AspectRatio, BorderInsets, NormalizeOptions, NormalizedImage, Rect, SUPPORTED_RATIOS};
