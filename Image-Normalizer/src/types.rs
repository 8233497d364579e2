use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

/// Ratios the upstream image models accept as an explicit hint.
pub const SUPPORTED_RATIOS: [(u32, u32); 10] = [
    (1, 1),
    (2, 3),
    (3, 2),
    (3, 4),
    (4, 3),
    (4, 5),
    (5, 4),
    (9, 16),
    (16, 9),
    (21, 9),
];

/// Requested output aspect ratio.
///
/// `Auto` defers to whatever the generator produced (or the first reference
/// image); `Fixed` forces a `width:height` ratio. Serialized as the token
/// string, e.g. `"Auto"` or `"16:9"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    #[default]
    Auto,
    Fixed { width: u32, height: u32 },
}

impl AspectRatio {
    /// Build a fixed ratio. Both terms must be non-zero.
    pub fn fixed(width: u32, height: u32) -> Result<Self, NormalizeError> {
        if width == 0 || height == 0 {
            return Err(NormalizeError::InvalidRatio(format!("{}:{}", width, height)));
        }
        Ok(Self::Fixed { width, height })
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// `Auto`, or a fixed ratio that reduces to an entry of [`SUPPORTED_RATIOS`].
    pub fn is_supported(&self) -> bool {
        match *self {
            Self::Auto => true,
            Self::Fixed { width, height } => {
                let d = gcd(width, height);
                SUPPORTED_RATIOS.contains(&(width / d, height / d))
            }
        }
    }

    /// Width divided by height, or `None` for `Auto`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Auto => None,
            Self::Fixed { width, height } => Some(*width as f64 / *height as f64),
        }
    }

    /// Pick the entry of [`SUPPORTED_RATIOS`] closest to the given dimensions.
    ///
    /// Distance is measured on the log of the ratio so that 2:1 and 1:2 are
    /// equally far from square.
    pub fn closest_supported(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::Fixed {
                width: 1,
                height: 1,
            };
        }
        let actual = (width as f64 / height as f64).ln();
        let (w, h) = SUPPORTED_RATIOS
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = ((a.0 as f64 / a.1 as f64).ln() - actual).abs();
                let db = ((b.0 as f64 / b.1 as f64).ln() - actual).abs();
                da.total_cmp(&db)
            })
            .unwrap_or((1, 1));
        Self::Fixed {
            width: w,
            height: h,
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("Auto"),
            Self::Fixed { width, height } => write!(f, "{}:{}", width, height),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let (w, h) = trimmed
            .split_once(':')
            .ok_or_else(|| NormalizeError::InvalidRatio(s.to_string()))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| NormalizeError::InvalidRatio(s.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| NormalizeError::InvalidRatio(s.to_string()))?;
        Self::fixed(width, height)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = NormalizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

/// Tuning knobs for [`normalize`](crate::normalize).
///
/// The defaults produce a 2048px long side with a 1024px floor on the short
/// side, and only strip borders thicker than 3% of the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeOptions {
    /// Target length of the longer output side.
    pub max_long_side: u32,
    /// The shorter output side never drops below this.
    pub min_short_side: u32,
    /// Luminance (0-255) at or above which a pixel counts as near-white.
    pub white_threshold: u8,
    /// Sample every Nth pixel along a scanned row or column.
    pub sample_step: u32,
    /// A row/column belongs to the border while at least this share of its
    /// samples is near-white.
    pub border_row_ratio: f64,
    /// Borders are only applied if one side exceeds this share of its dimension.
    pub significance_ratio: f64,
    /// Relative ratio difference below which no crop is performed.
    pub ratio_tolerance: f64,
    /// Hard ceiling on either output side. Ratios that would exceed it are rejected.
    #[serde(default = "default_max_output_side")]
    pub max_output_side: u32,
}

fn default_max_output_side() -> u32 {
    8192
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_long_side: 2048,
            min_short_side: 1024,
            white_threshold: 240,
            sample_step: 4,
            border_row_ratio: 0.80,
            significance_ratio: 0.03,
            ratio_tolerance: 0.01,
            max_output_side: default_max_output_side(),
        }
    }
}

impl NormalizeOptions {
    /// Set the long-side and short-side output bounds.
    pub fn with_output_bounds(mut self, max_long_side: u32, min_short_side: u32) -> Self {
        self.max_long_side = max_long_side.max(1);
        self.min_short_side = min_short_side.max(1);
        self
    }

    /// Set the ceiling on either output side.
    pub fn with_max_output_side(mut self, side: u32) -> Self {
        self.max_output_side = side.max(1);
        self
    }

    /// Set the near-white luminance threshold.
    pub fn with_white_threshold(mut self, threshold: u8) -> Self {
        self.white_threshold = threshold;
        self
    }

    /// Set the pixel sampling stride used during border scans.
    pub fn with_sample_step(mut self, step: u32) -> Self {
        self.sample_step = step.max(1);
        self
    }

    /// Set the minimum border thickness (as a share of the dimension) that
    /// makes detected borders count.
    pub fn with_significance_ratio(mut self, ratio: f64) -> Self {
        self.significance_ratio = ratio;
        self
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// Detected uniform border thickness per side, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderInsets {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl BorderInsets {
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// Output of the normalization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// MIME type of `bytes` (`image/png` unless the input passed through untouched).
    pub mime_type: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio_tokens() {
        assert_eq!("Auto".parse::<AspectRatio>().unwrap(), AspectRatio::Auto);
        assert_eq!("auto".parse::<AspectRatio>().unwrap(), AspectRatio::Auto);
        assert_eq!(
            "16:9".parse::<AspectRatio>().unwrap(),
            AspectRatio::Fixed {
                width: 16,
                height: 9
            }
        );
        assert_eq!(
            " 3 : 4 ".parse::<AspectRatio>().unwrap(),
            AspectRatio::Fixed {
                width: 3,
                height: 4
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("16x9".parse::<AspectRatio>().is_err());
        assert!("0:9".parse::<AspectRatio>().is_err());
        assert!("a:b".parse::<AspectRatio>().is_err());
        assert!("".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_supported_ratios() {
        assert!(AspectRatio::Auto.is_supported());
        assert!(AspectRatio::fixed(16, 9).unwrap().is_supported());
        assert!(AspectRatio::fixed(32, 18).unwrap().is_supported());
        assert!(!AspectRatio::fixed(1000, 1).unwrap().is_supported());
        assert!(!AspectRatio::fixed(5, 3).unwrap().is_supported());
    }

    #[test]
    fn test_display_matches_token() {
        assert_eq!(AspectRatio::Auto.to_string(), "Auto");
        assert_eq!(AspectRatio::fixed(21, 9).unwrap().to_string(), "21:9");
    }

    #[test]
    fn test_string_conversions_use_token() {
        let token = String::from(AspectRatio::fixed(4, 5).unwrap());
        assert_eq!(token, "4:5");
        let back = AspectRatio::try_from(token).unwrap();
        assert_eq!(back, AspectRatio::fixed(4, 5).unwrap());
        assert!(AspectRatio::try_from("wide".to_string()).is_err());
    }

    #[test]
    fn test_closest_supported() {
        assert_eq!(
            AspectRatio::closest_supported(1920, 1080),
            AspectRatio::fixed(16, 9).unwrap()
        );
        assert_eq!(
            AspectRatio::closest_supported(1000, 1010),
            AspectRatio::fixed(1, 1).unwrap()
        );
        assert_eq!(
            AspectRatio::closest_supported(1080, 1350),
            AspectRatio::fixed(4, 5).unwrap()
        );
        assert_eq!(
            AspectRatio::closest_supported(0, 10),
            AspectRatio::fixed(1, 1).unwrap()
        );
    }

    #[test]
    fn test_options_builder_clamps() {
        let opts = NormalizeOptions::default()
            .with_output_bounds(0, 0)
            .with_sample_step(0);
        assert_eq!(opts.max_long_side, 1);
        assert_eq!(opts.min_short_side, 1);
        assert_eq!(opts.sample_step, 1);
    }
}
