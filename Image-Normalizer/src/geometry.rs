use crate::error::{NormalizeError, Result};
use crate::types::{NormalizeOptions, Rect};

/// Center-crop `basis` to the `target` width/height ratio.
///
/// Trims symmetrically from the longer dimension. When the ratios already
/// agree within `tolerance` (relative), `basis` is returned unchanged.
pub fn crop_to_ratio(basis: Rect, target: f64, tolerance: f64) -> Rect {
    if basis.width == 0 || basis.height == 0 || target <= 0.0 {
        return basis;
    }

    let current = basis.ratio();
    if ((current - target) / target).abs() <= tolerance {
        return basis;
    }

    if current > target {
        let width = ((basis.height as f64 * target).round() as u32).clamp(1, basis.width);
        Rect {
            x: basis.x + (basis.width - width) / 2,
            width,
            ..basis
        }
    } else {
        let height = ((basis.width as f64 / target).round() as u32).clamp(1, basis.height);
        Rect {
            y: basis.y + (basis.height - height) / 2,
            height,
            ..basis
        }
    }
}

/// Final output size for a target ratio.
///
/// The longer side is `max_long_side`; if that would push the shorter side
/// under `min_short_side`, the shorter side is pinned to the floor and the
/// longer side is recomputed from the ratio.
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidRatio`] if either side would exceed
/// `max_output_side`.
pub fn output_dimensions(target: f64, opts: &NormalizeOptions) -> Result<(u32, u32)> {
    if !target.is_finite() || target <= 0.0 {
        return Err(NormalizeError::InvalidRatio(target.to_string()));
    }
    let long = opts.max_long_side as f64;
    let floor = opts.min_short_side as f64;

    let (width, height) = if target >= 1.0 {
        let height = long / target;
        if height < floor {
            (floor * target, floor)
        } else {
            (long, height)
        }
    } else {
        let width = long * target;
        if width < floor {
            (floor, floor / target)
        } else {
            (width, long)
        }
    };

    let (width, height) = (width.round().max(1.0), height.round().max(1.0));
    let cap = opts.max_output_side as f64;
    if width > cap || height > cap {
        return Err(NormalizeError::InvalidRatio(format!(
            "{:.4} needs {}x{} output, above the {}px limit",
            target, width, height, opts.max_output_side
        )));
    }

    Ok((width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_wide_to_square() {
        let rect = crop_to_ratio(Rect::full(3000, 2000), 1.0, 0.01);
        assert_eq!(
            rect,
            Rect {
                x: 500,
                y: 0,
                width: 2000,
                height: 2000
            }
        );
    }

    #[test]
    fn test_crop_tall_to_landscape() {
        let rect = crop_to_ratio(Rect::full(1200, 1200), 16.0 / 9.0, 0.01);
        assert_eq!(rect.width, 1200);
        assert_eq!(rect.height, 675);
        assert_eq!(rect.y, 262);
    }

    #[test]
    fn test_crop_respects_basis_offset() {
        let basis = Rect {
            x: 0,
            y: 60,
            width: 1000,
            height: 540,
        };
        let rect = crop_to_ratio(basis, 1.0, 0.01);
        assert_eq!(rect.x, 230);
        assert_eq!(rect.y, 60);
        assert_eq!(rect.width, 540);
        assert_eq!(rect.height, 540);
    }

    #[test]
    fn test_no_crop_within_tolerance() {
        let basis = Rect::full(1000, 995);
        assert_eq!(crop_to_ratio(basis, 1.0, 0.01), basis);
    }

    #[test]
    fn test_output_square() {
        assert_eq!(output_dimensions(1.0, &NormalizeOptions::default()).unwrap(), (2048, 2048));
    }

    #[test]
    fn test_output_landscape_and_portrait() {
        let opts = NormalizeOptions::default();
        assert_eq!(output_dimensions(16.0 / 9.0, &opts).unwrap(), (2048, 1152));
        assert_eq!(output_dimensions(9.0 / 16.0, &opts).unwrap(), (1152, 2048));
        assert_eq!(output_dimensions(4.0 / 3.0, &opts).unwrap(), (2048, 1536));
    }

    #[test]
    fn test_output_pins_short_side_floor() {
        let opts = NormalizeOptions::default();
        let (w, h) = output_dimensions(21.0 / 9.0, &opts).unwrap();
        assert_eq!(h, 1024);
        assert_eq!(w, 2389);

        let (w, h) = output_dimensions(9.0 / 21.0, &opts).unwrap();
        assert_eq!(w, 1024);
        assert_eq!(h, 2389);
    }

    #[test]
    fn test_output_rejects_extreme_ratios() {
        let opts = NormalizeOptions::default();
        assert!(matches!(
            output_dimensions(1000.0, &opts),
            Err(NormalizeError::InvalidRatio(_))
        ));
        assert!(matches!(
            output_dimensions(4_000_000_000.0, &opts),
            Err(NormalizeError::InvalidRatio(_))
        ));
        assert!(matches!(
            output_dimensions(1.0 / 1000.0, &opts),
            Err(NormalizeError::InvalidRatio(_))
        ));
        assert!(output_dimensions(0.0, &opts).is_err());
    }

    #[test]
    fn test_output_cap_is_configurable() {
        let opts = NormalizeOptions::default().with_max_output_side(2048);
        assert!(output_dimensions(1.0, &opts).is_ok());
        assert!(output_dimensions(21.0 / 9.0, &opts).is_err());
    }
}
