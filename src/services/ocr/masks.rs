//! Mask generation: several binary renderings of one region, each tuned to a
//! different text color or contrast hypothesis.

use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use super::engine::PageSegMode;
use super::preprocessing as px;
use crate::models::config::MaskConfig;

/// Renders a region at the given scale factor
pub type RenderFn = fn(&RgbImage, f32, &MaskConfig) -> GrayImage;

/// A named mask strategy
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    /// Target glyph heights in px; each maps to one scale factor
    pub target_heights: &'static [u32],
    /// Recognition modes this strategy's masks are queued in
    pub modes: &'static [PageSegMode],
    pub render: RenderFn,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("target_heights", &self.target_heights)
            .field("modes", &self.modes)
            .finish()
    }
}

const LINE: &[PageSegMode] = &[PageSegMode::SingleLine];
const LINE_AND_WORD: &[PageSegMode] = &[PageSegMode::SingleLine, PageSegMode::SingleWord];

/// Strategies for percentage readouts, in sweep order
pub const EXP_STRATEGIES: &[Strategy] = &[
    Strategy { name: "warm", target_heights: &[50, 60, 80], modes: LINE_AND_WORD, render: warm },
    Strategy { name: "hsv_warm", target_heights: &[50, 60], modes: LINE, render: hsv_warm },
    Strategy { name: "bright", target_heights: &[50, 60], modes: LINE, render: bright },
    Strategy { name: "gold", target_heights: &[50, 60], modes: LINE, render: gold },
    Strategy { name: "gold_dots", target_heights: &[60, 80], modes: LINE, render: gold_dots },
    Strategy { name: "dots_gray", target_heights: &[60, 80, 100], modes: LINE, render: dots_gray },
    Strategy { name: "otsu", target_heights: &[60], modes: LINE, render: otsu },
    Strategy { name: "adaptive", target_heights: &[60], modes: LINE, render: adaptive },
    Strategy { name: "sharp", target_heights: &[80], modes: LINE, render: sharp },
];

/// Color strategies for free-text overlays (names, levels, hp), swept scale-major
pub const TEXT_COLOR_STRATEGIES: &[Strategy] = &[
    Strategy { name: "warm", target_heights: &[50, 60], modes: LINE, render: warm },
    Strategy { name: "hsv_warm", target_heights: &[50, 60], modes: LINE, render: hsv_warm },
    Strategy { name: "gold", target_heights: &[50, 60], modes: LINE, render: gold },
];

/// Grayscale fallbacks tried after the text color strategies
pub const TEXT_FALLBACK_STRATEGIES: &[Strategy] = &[
    Strategy { name: "otsu", target_heights: &[60], modes: LINE, render: otsu },
    Strategy { name: "sharp", target_heights: &[80], modes: LINE, render: sharp },
];

/// Binary raster produced by exactly one strategy
#[derive(Debug, Clone)]
pub struct Mask {
    pub label: String,
    pub image: GrayImage,
    pub modes: &'static [PageSegMode],
}

impl Mask {
    /// Tonal inverse, an independent candidate
    pub fn inverse(&self) -> Mask {
        Mask {
            label: format!("{}_inv", self.label),
            image: px::invert(&self.image),
            modes: self.modes,
        }
    }
}

/// Mask generator service
pub struct MaskGenerator {
    config: MaskConfig,
}

impl MaskGenerator {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    /// Distinct scale factors for a strategy, in declared order
    pub fn scales_for(&self, strategy: &Strategy, region_height: u32) -> Vec<f32> {
        let mut scales: Vec<f32> = Vec::with_capacity(strategy.target_heights.len());
        for &target in strategy.target_heights {
            let scale = self.config.scale_for(region_height, target);
            if !scales.iter().any(|s| (s - scale).abs() < f32::EPSILON) {
                scales.push(scale);
            }
        }
        scales
    }

    /// Render every strategy at each of its scales, strategy by strategy.
    /// Rasterization runs in parallel; the returned order is the declared order.
    pub fn generate(&self, region: &RgbImage, strategies: &[Strategy]) -> Vec<Mask> {
        let jobs: Vec<(&Strategy, f32)> = strategies
            .iter()
            .flat_map(|strategy| {
                self.scales_for(strategy, region.height())
                    .into_iter()
                    .map(move |scale| (strategy, scale))
            })
            .collect();

        self.render_jobs(region, jobs)
    }

    /// Like `generate`, but every strategy's first scale comes before any
    /// strategy's second scale
    pub fn generate_scale_major(&self, region: &RgbImage, strategies: &[Strategy]) -> Vec<Mask> {
        let scales: Vec<Vec<f32>> = strategies
            .iter()
            .map(|strategy| self.scales_for(strategy, region.height()))
            .collect();
        let passes = scales.iter().map(Vec::len).max().unwrap_or(0);

        let mut jobs = Vec::new();
        for pass in 0..passes {
            for (strategy, strategy_scales) in strategies.iter().zip(&scales) {
                if let Some(&scale) = strategy_scales.get(pass) {
                    jobs.push((strategy, scale));
                }
            }
        }

        self.render_jobs(region, jobs)
    }

    fn render_jobs(&self, region: &RgbImage, jobs: Vec<(&Strategy, f32)>) -> Vec<Mask> {
        jobs.into_par_iter()
            .map(|(strategy, scale)| Mask {
                label: format!("{}_{:.1}", strategy.name, scale),
                image: (strategy.render)(region, scale, &self.config),
                modes: strategy.modes,
            })
            .collect()
    }
}

fn warm(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let t = &config.warm;
    let mask = px::color_mask(region, |r, g, b| {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        r >= b * t.red_to_blue
            && r >= t.min_red as f32
            && g >= t.min_green as f32
            && r + g > b * t.blue_weight + t.sum_offset
    });
    let scaled = px::scale(&mask, scale, FilterType::Nearest);
    px::open(&px::close(&scaled, 3, 3), 2, 2)
}

fn hsv_warm(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let mask = px::hsv_mask(region, &[config.hsv_warm_gold, config.hsv_warm_white]);
    let scaled = px::scale(&mask, scale, FilterType::Nearest);
    px::close(&scaled, 2, 2)
}

fn bright(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let lightness = px::lab_lightness(region);
    let scaled = px::scale(&lightness, scale, FilterType::CatmullRom);
    let enhanced = px::clahe(&scaled, config.bright_clahe);
    let mask = px::threshold(&enhanced, config.bright_threshold);
    px::close(&px::open(&mask, 2, 2), 2, 2)
}

fn gold_isolation(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let mask = px::hsv_mask(region, &[config.gold, config.gold_white]);
    px::scale(&mask, scale, FilterType::Nearest)
}

fn gold(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    px::close(&gold_isolation(region, scale, config), 2, 2)
}

// No morphology: a 2x2 close or open can erase the decimal point
fn gold_dots(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    gold_isolation(region, scale, config)
}

fn upscaled_gray(region: &RgbImage, scale: f32, filter: FilterType) -> GrayImage {
    px::scale(&px::grayscale(region), scale, filter)
}

fn dots_gray(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let gray = upscaled_gray(region, scale, FilterType::CatmullRom);
    px::otsu(&px::clahe(&gray, config.dots_clahe))
}

fn otsu(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let gray = upscaled_gray(region, scale, FilterType::CatmullRom);
    let binary = px::otsu(&px::clahe(&gray, config.otsu_clahe));
    px::close(&binary, 2, 2)
}

fn adaptive(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let gray = upscaled_gray(region, scale, FilterType::CatmullRom);
    let block = config.adaptive_min_block.max((gray.height() / 4) | 1);
    let binary = px::adaptive_threshold(&gray, block, config.adaptive_offset);
    px::close(&binary, 2, 2)
}

fn sharp(region: &RgbImage, scale: f32, config: &MaskConfig) -> GrayImage {
    let gray = upscaled_gray(region, scale, FilterType::Triangle);
    px::otsu(&px::unsharp(&gray, config.sharp_sigma, config.sharp_strength))
}

/// Plain grayscale rendering for block text, no binarization
pub fn plain_gray(region: &RgbImage) -> GrayImage {
    px::grayscale(region)
}
