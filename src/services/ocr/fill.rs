//! Independent measurement of how far the colored progress bar is filled.

use image::{GenericImageView, GrayImage, RgbImage};

use super::preprocessing as px;
use crate::models::config::{FillConfig, HsvRange};

/// Fill estimator service
pub struct FillEstimator {
    config: FillConfig,
}

impl FillEstimator {
    pub fn new(config: FillConfig) -> Self {
        Self { config }
    }

    /// Filled proportion of the bar in [0, 1]; `None` when the region is too
    /// small or the detected fill is implausible
    pub fn estimate(&self, region: &RgbImage) -> Option<f64> {
        let c = &self.config;
        let (w, h) = region.dimensions();
        if w < c.min_width || h < c.min_height {
            return None;
        }

        // Step 1: Central band with tight thresholds
        let top = (h as f32 * c.band_top) as u32;
        let bottom = ((h as f32 * c.band_bottom) as u32).max(top + 1).min(h);
        let mut mask = self.bar_mask(&band(region, top, bottom), c.tight_hue, false);

        // Step 2: Lower band with wide thresholds
        if px::count_foreground(&mask) == 0 {
            let lower_top = ((h as f32 * c.retry_band_top) as u32).min(h - 1);
            mask = self.bar_mask(&band(region, lower_top, h), c.wide_hue, true);
            if px::count_foreground(&mask) == 0 {
                return Some(0.0);
            }
        }

        // Ghost suppression
        let total = (mask.width() * mask.height()) as f32;
        if (px::count_foreground(&mask) as f32) / total < c.min_fill_fraction {
            return Some(0.0);
        }

        // Step 3: Column extent, ignoring the text area on the right
        let cutoff = (w as f32 * (1.0 - c.ignore_right_fraction)) as u32;
        let mut min_col = w;
        let mut max_col = 0;
        for (x, _, p) in mask.enumerate_pixels() {
            if x < cutoff && p[0] > 0 {
                min_col = min_col.min(x);
                max_col = max_col.max(x);
            }
        }
        if min_col > max_col {
            return None;
        }

        let mut span = max_col - min_col + 1;
        let span_fraction = span as f32 / w as f32;
        let (pad_lo, pad_hi) = c.padding_window;
        if span_fraction > pad_lo && span_fraction < pad_hi {
            span = (span + c.gradient_padding).min(w - min_col);
        }

        // Step 4: Plausibility guards
        let min_span = c.min_span_px.max((w as f32 * c.min_span_fraction) as u32);
        if span < min_span {
            return None;
        }
        if min_col as f32 > w as f32 * c.max_start_fraction {
            return None;
        }

        let ratio = span as f64 / (w - min_col).max(1) as f64;
        Some(ratio.clamp(0.0, 1.0))
    }

    fn bar_mask(&self, band: &RgbImage, hue: HsvRange, wide: bool) -> GrayImage {
        let c = &self.config;
        let mask = px::color_mask(band, |r, g, b| {
            let (ri, gi, bi) = (r as i16, g as i16, b as i16);
            hue.contains(px::rgb_to_hsv(r, g, b))
                || (bi - ri > c.blue_over_red && bi - gi > c.blue_over_green && b > c.min_blue)
        });

        let closed = px::close(&mask, 3, 1);
        if wide {
            px::dilate(&closed, c.wide_dilate, 1)
        } else {
            closed
        }
    }
}

fn band(region: &RgbImage, top: u32, bottom: u32) -> RgbImage {
    region.view(0, top, region.width(), bottom - top).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const CYAN: Rgb<u8> = Rgb([0, 200, 255]);
    const DARK: Rgb<u8> = Rgb([15, 15, 20]);

    fn estimator() -> FillEstimator {
        FillEstimator::new(FillConfig::default())
    }

    /// Helper: bar region with the left `filled` columns painted cyan
    fn create_bar(width: u32, height: u32, filled: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| if x < filled { CYAN } else { DARK })
    }

    #[test]
    fn test_too_small_region() {
        assert_eq!(estimator().estimate(&create_bar(9, 20, 5)), None);
        assert_eq!(estimator().estimate(&create_bar(100, 5, 50)), None);
    }

    #[test]
    fn test_blank_region_is_empty_bar() {
        let region = RgbImage::from_pixel(200, 20, DARK);
        assert_eq!(estimator().estimate(&region), Some(0.0));
    }

    #[test]
    fn test_half_filled_bar() {
        let ratio = estimator().estimate(&create_bar(200, 20, 100)).unwrap();

        // 100 columns plus 6 px gradient padding
        assert!((ratio - 0.53).abs() < 1e-9, "Expected 0.53, got {}", ratio);
        assert!((ratio - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_full_bar_ignores_text_area() {
        let ratio = estimator().estimate(&create_bar(200, 20, 200)).unwrap();

        // Only the leftmost 180 columns are inspected
        assert!((ratio - 0.9).abs() < 1e-9, "Expected 0.9, got {}", ratio);
    }

    #[test]
    fn test_fill_starting_far_right_is_rejected() {
        let region = RgbImage::from_fn(200, 20, |x, _| if (120..170).contains(&x) { CYAN } else { DARK });
        assert_eq!(estimator().estimate(&region), None);
    }

    #[test]
    fn test_ghost_fill_is_suppressed() {
        // 3 cyan columns out of 200: under the 2% floor
        assert_eq!(estimator().estimate(&create_bar(200, 20, 3)), Some(0.0));
    }

    #[test]
    fn test_lower_band_retry() {
        // Bar only occupies the bottom rows, below the central band
        let region = RgbImage::from_fn(200, 20, |x, y| if y >= 17 && x < 60 { CYAN } else { DARK });
        let ratio = estimator().estimate(&region).unwrap();

        assert!(ratio > 0.25 && ratio < 0.4, "Expected ~0.33, got {}", ratio);
    }

    #[test]
    fn test_result_in_unit_range() {
        for filled in [0, 10, 50, 99, 150, 199] {
            if let Some(r) = estimator().estimate(&create_bar(200, 12, filled)) {
                assert!((0.0..=1.0).contains(&r), "fill {} gave {}", filled, r);
            }
        }
    }
}
