use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recognition adapter settings (tesseract executable)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognizerConfig {
    pub tesseract_exe: String,
    pub tessdata_dir: Option<PathBuf>,
    pub lang: String,
    /// Per-call budget; a call exceeding it yields an empty string
    pub timeout_ms: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            tesseract_exe: "tesseract".to_string(),
            tessdata_dir: None,
            lang: "eng".to_string(),
            timeout_ms: 1500,
        }
    }
}

/// Debug artifact persistence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
        }
    }
}

impl DebugConfig {
    /// Resolve the destination directory, falling back to the platform data dir
    pub fn resolved_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }

        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("exp-ocr-worker")
            .join("debug")
    }
}

/// Contrast limited adaptive histogram equalization parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClaheParams {
    pub clip_limit: f32,
    pub tiles: u32,
}

/// Joint red/green dominance over blue (gold and white glyphs over cool scenery)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarmThresholds {
    pub red_to_blue: f32,
    pub min_red: u8,
    pub min_green: u8,
    pub blue_weight: f32,
    pub sum_offset: f32,
}

impl Default for WarmThresholds {
    fn default() -> Self {
        Self {
            red_to_blue: 0.9,
            min_red: 120,
            min_green: 100,
            blue_weight: 1.5,
            sum_offset: 100.0,
        }
    }
}

/// Mask strategy thresholds and the upscaling policy shared by all of them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub warm: WarmThresholds,
    pub hsv_warm_gold: HsvRange,
    pub hsv_warm_white: HsvRange,
    pub gold: HsvRange,
    pub gold_white: HsvRange,
    pub bright_threshold: u8,
    pub bright_clahe: ClaheParams,
    pub dots_clahe: ClaheParams,
    pub otsu_clahe: ClaheParams,
    pub adaptive_min_block: u32,
    pub adaptive_offset: i32,
    pub sharp_sigma: f32,
    pub sharp_strength: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            min_scale: 3.0,
            max_scale: 12.0,
            warm: WarmThresholds::default(),
            hsv_warm_gold: HsvRange::new([10, 60, 140], [45, 255, 255]),
            hsv_warm_white: HsvRange::new([0, 0, 200], [180, 50, 255]),
            gold: HsvRange::new([10, 60, 140], [40, 255, 255]),
            gold_white: HsvRange::new([0, 0, 190], [180, 50, 255]),
            bright_threshold: 200,
            bright_clahe: ClaheParams { clip_limit: 4.0, tiles: 4 },
            dots_clahe: ClaheParams { clip_limit: 3.0, tiles: 4 },
            otsu_clahe: ClaheParams { clip_limit: 2.0, tiles: 8 },
            adaptive_min_block: 11,
            adaptive_offset: 2,
            sharp_sigma: 2.0,
            sharp_strength: 1.1,
        }
    }
}

impl MaskConfig {
    /// Scale factor bringing a region of `height` px to `target_height` px
    pub fn scale_for(&self, height: u32, target_height: u32) -> f32 {
        if height == 0 {
            return 6.0_f32.max(self.min_scale).min(self.max_scale);
        }
        let scale = target_height as f32 / height as f32;
        scale.max(self.min_scale).min(self.max_scale)
    }
}

/// Candidate scoring weights
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub per_digit: i32,
    pub decimal_bonus: i32,
    pub shape_bonus: i32,
    pub percent_bonus: i32,
    pub unexpected_char_penalty: i32,
    pub plausible_bonus: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            per_digit: 10,
            decimal_bonus: 200,
            shape_bonus: 80,
            percent_bonus: 20,
            unexpected_char_penalty: 15,
            plausible_bonus: 30,
        }
    }
}

/// HSV window in OpenCV units (H 0-179, S/V 0-255)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Progress bar fill measurement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FillConfig {
    pub min_width: u32,
    pub min_height: u32,
    /// Primary band as fractions of the region height
    pub band_top: f32,
    pub band_bottom: f32,
    /// Alternate band used when the primary band has no bar pixels
    pub retry_band_top: f32,
    pub tight_hue: HsvRange,
    pub wide_hue: HsvRange,
    /// Blue-dominance heuristic unioned with both hue masks
    pub blue_over_red: i16,
    pub blue_over_green: i16,
    pub min_blue: u8,
    /// Horizontal dilation applied to the wide mask only
    pub wide_dilate: u32,
    /// Fraction of band pixels below which the bar counts as empty
    pub min_fill_fraction: f32,
    /// Right-hand share of the width ignored (percentage text area)
    pub ignore_right_fraction: f32,
    /// Padding applied only when span/width lies strictly inside this window
    pub padding_window: (f32, f32),
    pub gradient_padding: u32,
    pub min_span_px: u32,
    pub min_span_fraction: f32,
    /// Fill starting right of this fraction of the width is rejected
    pub max_start_fraction: f32,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            min_width: 10,
            min_height: 6,
            band_top: 0.2,
            band_bottom: 0.8,
            retry_band_top: 0.45,
            tight_hue: HsvRange::new([75, 40, 90], [125, 255, 255]),
            wide_hue: HsvRange::new([60, 25, 70], [140, 255, 255]),
            blue_over_red: 40,
            blue_over_green: 10,
            min_blue: 90,
            wide_dilate: 5,
            min_fill_fraction: 0.02,
            ignore_right_fraction: 0.1,
            padding_window: (0.1, 0.9),
            gradient_padding: 6,
            min_span_px: 4,
            min_span_fraction: 0.03,
            max_start_fraction: 0.45,
        }
    }
}

/// Post-selection cross-check against the fill estimate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Fill-implied percentages outside this range are not trusted
    pub credible_min: f64,
    pub credible_max: f64,
    /// Snap to the fill value when the reading is below it by more than this
    pub below_margin: f64,
    /// Minimum distance reduction for a digit substitution to be accepted
    pub substitution_min_gain: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            credible_min: 5.0,
            credible_max: 99.5,
            below_margin: 8.0,
            substitution_min_gain: 0.25,
        }
    }
}

/// Candidate sweep policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SweepConfig {
    /// Stop recognizing further masks once a candidate reaches this score
    pub early_exit_score: Option<i32>,
}

/// Complete worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WorkerConfig {
    pub recognizer: RecognizerConfig,
    pub debug: DebugConfig,
    pub masks: MaskConfig,
    pub scoring: ScoringConfig,
    pub fill: FillConfig,
    pub correction: CorrectionConfig,
    pub sweep: SweepConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();

        assert_eq!(config.recognizer.tesseract_exe, "tesseract");
        assert_eq!(config.recognizer.lang, "eng");
        assert_eq!(config.recognizer.timeout_ms, 1500);
        assert!(!config.debug.enabled);
        assert_eq!(config.scoring.decimal_bonus, 200);
        assert_eq!(config.correction.below_margin, 8.0);
        assert!(config.sweep.early_exit_score.is_none());
    }

    #[test]
    fn test_worker_config_serialization() {
        let config = WorkerConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();

        let deserialized: WorkerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"recognizer": {"timeout_ms": 500}, "sweep": {"early_exit_score": 390}}"#;
        let config: WorkerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.recognizer.timeout_ms, 500);
        assert_eq!(config.recognizer.tesseract_exe, "tesseract");
        assert_eq!(config.sweep.early_exit_score, Some(390));
        assert_eq!(config.fill, FillConfig::default());
    }

    #[test]
    fn test_scale_for_small_region() {
        let masks = MaskConfig::default();

        assert_eq!(masks.scale_for(12, 60), 5.0);
        // Large regions never go below the floor
        assert_eq!(masks.scale_for(100, 60), 3.0);
        // Tiny regions are capped
        assert_eq!(masks.scale_for(2, 60), 12.0);
    }

    #[test]
    fn test_hsv_range_contains() {
        let range = HsvRange::new([75, 40, 90], [125, 255, 255]);

        assert!(range.contains([90, 200, 200]));
        assert!(!range.contains([30, 200, 200]), "Gold hue is outside the bar range");
        assert!(!range.contains([90, 10, 200]), "Desaturated pixels are rejected");
    }

    #[test]
    fn test_debug_dir_override() {
        let debug = DebugConfig {
            enabled: true,
            dir: Some(PathBuf::from("/tmp/ocr-debug")),
        };
        assert_eq!(debug.resolved_dir(), PathBuf::from("/tmp/ocr-debug"));
        assert!(DebugConfig::default().resolved_dir().ends_with("debug"));
    }
}
