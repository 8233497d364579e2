use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GenerationRequest, ImageModel};

/// Batch variation clauses, cycled for every image after the first.
pub const VARIATION_CLAUSES: [&str; 4] = [
    "alternate perspective",
    "different angle",
    "alternative composition",
    "varied lighting",
];

/// How the images of one request are sent to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchMode {
    /// One call at a time; each image's retries finish before the next starts.
    Sequential,
    /// All calls initiated together and joined.
    Parallel,
}

impl DispatchMode {
    /// Multi-reference, style/structure-guided or Pro-tier requests are
    /// complex and go sequentially; everything else fans out.
    pub fn for_request(request: &GenerationRequest) -> Self {
        let complex = request.total_references() > 1
            || request.style_image.is_some()
            || request.structure_image.is_some()
            || request.model == ImageModel::Pro;
        if complex {
            DispatchMode::Sequential
        } else {
            DispatchMode::Parallel
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Sequential => f.write_str("sequential"),
            DispatchMode::Parallel => f.write_str("parallel"),
        }
    }
}

/// Prompt for image `index` of a `count`-image batch.
///
/// The first image (and any single-image request) uses the prompt verbatim.
pub fn prompt_for_image(base: &str, index: u32, count: u32) -> String {
    if count <= 1 || index == 0 {
        return base.to_string();
    }
    let clause = VARIATION_CLAUSES[(index as usize - 1) % VARIATION_CLAUSES.len()];
    let base = base.trim_end().trim_end_matches('.');
    if base.is_empty() {
        format!("Variation: {}, keep the same subject", clause)
    } else {
        format!("{}. Variation: {}, keep the same subject", base, clause)
    }
}
