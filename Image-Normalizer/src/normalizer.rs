use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use crate::border::content_rect;
use crate::error::{NormalizeError, Result};
use crate::geometry::{crop_to_ratio, output_dimensions};
use crate::types::{AspectRatio, NormalizeOptions, NormalizedImage};

/// Normalize a generated image to the requested aspect ratio.
///
/// For [`AspectRatio::Auto`] the input bytes are returned untouched (only the
/// dimensions are probed). Otherwise the pipeline strips significant
/// near-white borders, center-crops to the target ratio, resamples with
/// Lanczos3 to the size chosen by [`output_dimensions`] and encodes as PNG.
///
/// # Errors
///
/// Returns [`NormalizeError::Decode`] if `bytes` is not a decodable image,
/// or [`NormalizeError::InvalidRatio`] if the ratio would need an output side
/// above [`NormalizeOptions::max_output_side`].
pub fn normalize(
    bytes: &[u8],
    target: AspectRatio,
    opts: &NormalizeOptions,
) -> Result<NormalizedImage> {
    let Some(ratio) = target.as_f64() else {
        let format = image::guess_format(bytes).map_err(NormalizeError::Decode)?;
        let (width, height) = probe_dimensions(bytes)?;
        return Ok(NormalizedImage {
            bytes: bytes.to_vec(),
            width,
            height,
            mime_type: format.to_mime_type(),
        });
    };

    let (width, height) = output_dimensions(ratio, opts)?;
    let img = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
    let basis = content_rect(&img.to_rgb8(), opts);
    let crop = crop_to_ratio(basis, ratio, opts.ratio_tolerance);

    debug!(
        source = %format!("{}x{}", img.width(), img.height()),
        crop = %format!("{}x{}+{}+{}", crop.width, crop.height, crop.x, crop.y),
        output = %format!("{}x{}", width, height),
        ratio = %target,
        "normalizing image"
    );

    let resized = img
        .crop_imm(crop.x, crop.y, crop.width, crop.height)
        .resize_exact(width, height, FilterType::Lanczos3);

    Ok(NormalizedImage {
        bytes: encode(&resized, ImageFormat::Png)?,
        width,
        height,
        mime_type: ImageFormat::Png.to_mime_type(),
    })
}

/// Produce a JPEG thumbnail whose longer side is at most `max_side`.
pub fn thumbnail(bytes: &[u8], max_side: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
    let small = img.thumbnail(max_side.max(1), max_side.max(1));
    encode(&DynamicImage::ImageRgb8(small.to_rgb8()), ImageFormat::Jpeg)
}

/// Read the pixel dimensions of an encoded image without a full decode.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NormalizeError::Decode(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(NormalizeError::Decode)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .map_err(NormalizeError::Encode)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([30, 60, 90]));
        encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png).unwrap()
    }

    fn small_opts() -> NormalizeOptions {
        NormalizeOptions::default().with_output_bounds(256, 128)
    }

    #[test]
    fn test_auto_returns_input_unchanged() {
        let bytes = png(300, 200);
        let out = normalize(&bytes, AspectRatio::Auto, &small_opts()).unwrap();
        assert_eq!(out.bytes, bytes);
        assert_eq!((out.width, out.height), (300, 200));
        assert_eq!(out.mime_type, "image/png");
    }

    #[test]
    fn test_fixed_ratio_resizes() {
        let bytes = png(300, 200);
        let out = normalize(&bytes, AspectRatio::fixed(1, 1).unwrap(), &small_opts()).unwrap();
        assert_eq!((out.width, out.height), (256, 256));
        assert_eq!(probe_dimensions(&out.bytes).unwrap(), (256, 256));
    }

    #[test]
    fn test_decode_failure() {
        let err = normalize(b"not an image", AspectRatio::fixed(1, 1).unwrap(), &small_opts())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));

        let err = normalize(b"not an image", AspectRatio::Auto, &small_opts()).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));
    }

    #[test]
    fn test_thumbnail_is_jpeg_within_bounds() {
        let thumb = thumbnail(&png(400, 100), 64).unwrap();
        assert_eq!(image::guess_format(&thumb).unwrap(), ImageFormat::Jpeg);
        let (w, h) = probe_dimensions(&thumb).unwrap();
        assert_eq!(w, 64);
        assert_eq!(h, 16);
    }
}
