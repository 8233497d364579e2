use image::{Rgb, RgbImage};
use tracing::debug;

use crate::types::{BorderInsets, NormalizeOptions, Rect};

fn is_near_white(pixel: &Rgb<u8>, threshold: u8) -> bool {
    let [r, g, b] = pixel.0;
    let luminance = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    luminance >= threshold as f64
}

fn row_is_border(img: &RgbImage, y: u32, opts: &NormalizeOptions) -> bool {
    let samples = (0..img.width()).step_by(opts.sample_step.max(1) as usize);
    share_white(samples.map(|x| img.get_pixel(x, y)), opts)
}

fn column_is_border(img: &RgbImage, x: u32, opts: &NormalizeOptions) -> bool {
    let samples = (0..img.height()).step_by(opts.sample_step.max(1) as usize);
    share_white(samples.map(|y| img.get_pixel(x, y)), opts)
}

fn share_white<'a>(pixels: impl Iterator<Item = &'a Rgb<u8>>, opts: &NormalizeOptions) -> bool {
    let mut total = 0u32;
    let mut white = 0u32;
    for pixel in pixels {
        total += 1;
        if is_near_white(pixel, opts.white_threshold) {
            white += 1;
        }
    }
    total > 0 && white as f64 / total as f64 >= opts.border_row_ratio
}

/// Measure near-white borders by scanning inward from each edge.
///
/// A side stops growing at the first row/column whose sampled near-white
/// share falls below `border_row_ratio`. Scans never pass the midline.
pub fn detect_borders(img: &RgbImage, opts: &NormalizeOptions) -> BorderInsets {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return BorderInsets::default();
    }

    let scan = |limit: u32, is_border: &dyn Fn(u32) -> bool| -> u32 {
        (0..limit).take_while(|&i| is_border(i)).count() as u32
    };

    BorderInsets {
        top: scan(height / 2, &|i| row_is_border(img, i, opts)),
        bottom: scan(height / 2, &|i| row_is_border(img, height - 1 - i, opts)),
        left: scan(width / 2, &|i| column_is_border(img, i, opts)),
        right: scan(width / 2, &|i| column_is_border(img, width - 1 - i, opts)),
    }
}

/// True if at least one side is thicker than `significance_ratio` of its dimension.
pub fn is_significant(
    insets: &BorderInsets,
    width: u32,
    height: u32,
    opts: &NormalizeOptions,
) -> bool {
    let vertical = height as f64 * opts.significance_ratio;
    let horizontal = width as f64 * opts.significance_ratio;
    insets.top as f64 > vertical
        || insets.bottom as f64 > vertical
        || insets.left as f64 > horizontal
        || insets.right as f64 > horizontal
}

/// The crop basis: the full frame minus significant borders.
pub fn content_rect(img: &RgbImage, opts: &NormalizeOptions) -> Rect {
    let (width, height) = img.dimensions();
    let full = Rect::full(width, height);

    let insets = detect_borders(img, opts);
    if insets.is_empty() || !is_significant(&insets, width, height, opts) {
        return full;
    }

    let inner_width = width.saturating_sub(insets.left + insets.right);
    let inner_height = height.saturating_sub(insets.top + insets.bottom);
    if inner_width == 0 || inner_height == 0 {
        // Entirely white frame; nothing sensible to strip.
        return full;
    }

    debug!(
        top = insets.top,
        bottom = insets.bottom,
        left = insets.left,
        right = insets.right,
        "stripping uniform borders"
    );

    Rect {
        x: insets.left,
        y: insets.top,
        width: inner_width,
        height: inner_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([90, 110, 130]))
    }

    fn paint_rows(img: &mut RgbImage, rows: std::ops::Range<u32>) {
        for y in rows {
            for x in 0..img.width() {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
    }

    fn paint_columns(img: &mut RgbImage, cols: std::ops::Range<u32>) {
        for x in cols {
            for y in 0..img.height() {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
    }

    #[test]
    fn test_no_borders_on_plain_content() {
        let img = gray(200, 100);
        let insets = detect_borders(&img, &NormalizeOptions::default());
        assert!(insets.is_empty());
    }

    #[test]
    fn test_detects_each_side() {
        let mut img = gray(200, 100);
        paint_rows(&mut img, 0..10);
        paint_rows(&mut img, 95..100);
        paint_columns(&mut img, 0..20);
        paint_columns(&mut img, 190..200);

        let insets = detect_borders(&img, &NormalizeOptions::default());
        assert_eq!(insets.top, 10);
        assert_eq!(insets.bottom, 5);
        assert_eq!(insets.left, 20);
        assert_eq!(insets.right, 10);
    }

    #[test]
    fn test_row_with_some_content_still_counts() {
        // 10% dark pixels in an otherwise white row stays above the 80% bar.
        let mut img = gray(100, 50);
        paint_rows(&mut img, 0..4);
        for x in 0..10 {
            img.put_pixel(x, 0, Rgb([0, 0, 0]));
        }
        let opts = NormalizeOptions::default().with_sample_step(1);
        assert_eq!(detect_borders(&img, &opts).top, 4);
    }

    #[test]
    fn test_scan_stops_at_midline() {
        let img = RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]));
        let insets = detect_borders(&img, &NormalizeOptions::default());
        assert_eq!(insets.top, 10);
        assert_eq!(insets.left, 20);
    }

    #[test]
    fn test_significance_gate() {
        let opts = NormalizeOptions::default();
        let thin = BorderInsets {
            top: 2,
            ..Default::default()
        };
        let thick = BorderInsets {
            left: 40,
            ..Default::default()
        };
        assert!(!is_significant(&thin, 1000, 100, &opts));
        assert!(is_significant(&thick, 1000, 100, &opts));
    }

    #[test]
    fn test_content_rect_ignores_thin_margin() {
        let mut img = gray(1000, 600);
        paint_rows(&mut img, 0..6);
        let rect = content_rect(&img, &NormalizeOptions::default());
        assert_eq!(rect, Rect::full(1000, 600));
    }

    #[test]
    fn test_content_rect_excludes_thick_margin() {
        let mut img = gray(1000, 600);
        paint_rows(&mut img, 0..60);
        let rect = content_rect(&img, &NormalizeOptions::default());
        assert_eq!(
            rect,
            Rect {
                x: 0,
                y: 60,
                width: 1000,
                height: 540
            }
        );
    }

    #[test]
    fn test_all_white_frame_uses_full_rect() {
        let img = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        let rect = content_rect(&img, &NormalizeOptions::default());
        assert_eq!(rect, Rect::full(64, 64));
    }
}
