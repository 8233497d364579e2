use thiserror::Error;

/// Errors returned by the normalization pipeline.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The input bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),

    /// The normalized image could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),

    /// An aspect ratio token was not `Auto` or a positive `W:H` pair, or the
    /// ratio is too extreme to produce an output within the size limit.
    #[error("Invalid aspect ratio: {0}")]
    InvalidRatio(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, NormalizeError>;
