//! Pixel primitives shared by the mask strategies and the fill estimator.
//!
//! Color conversions follow the 8-bit conventions of common vision toolkits:
//! hue in 0-179, saturation and value in 0-255, lightness rescaled to 0-255.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

use crate::models::config::{ClaheParams, HsvRange};

const FG: u8 = 255;
const BG: u8 = 0;
/// Largest kernel side `Mask::from_image` accepts
const MAX_KERNEL: u32 = 511;

/// Convert RGB to HSV (H 0-179, S 0-255, V 0-255)
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let (rf, gf, bf) = (r as f32, g as f32, b as f32);

    // Hue in half-degrees
    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        30.0 * ((gf - bf) / delta)
    } else if max == g {
        30.0 * ((bf - rf) / delta + 2.0)
    } else {
        30.0 * ((rf - gf) / delta + 4.0)
    };
    h = h.round();
    if h < 0.0 {
        h += 180.0;
    }
    if h >= 180.0 {
        h -= 180.0;
    }

    let s = if max == 0 {
        0.0
    } else {
        (delta / max as f32 * 255.0).round()
    };

    [h as u8, s as u8, max]
}

/// Binary mask of pixels satisfying `predicate(r, g, b)`
pub fn color_mask<F>(rgb: &RgbImage, predicate: F) -> GrayImage
where
    F: Fn(u8, u8, u8) -> bool,
{
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        if predicate(p[0], p[1], p[2]) {
            Luma([FG])
        } else {
            Luma([BG])
        }
    })
}

/// Binary mask of pixels whose HSV value falls in any of `ranges`
pub fn hsv_mask(rgb: &RgbImage, ranges: &[HsvRange]) -> GrayImage {
    color_mask(rgb, |r, g, b| {
        let hsv = rgb_to_hsv(r, g, b);
        ranges.iter().any(|range| range.contains(hsv))
    })
}

/// Luma conversion
pub fn grayscale(rgb: &RgbImage) -> GrayImage {
    imageops::grayscale(rgb)
}

/// CIE L* channel rescaled to 0-255 (D65 white point)
pub fn lab_lightness(rgb: &RgbImage) -> GrayImage {
    fn linear(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let yl = 0.2126 * linear(p[0]) + 0.7152 * linear(p[1]) + 0.0722 * linear(p[2]);
        let l = if yl > 0.008856 {
            116.0 * yl.cbrt() - 16.0
        } else {
            903.3 * yl
        };
        Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
    })
}

/// Resize by `factor` (at least 1x1)
pub fn scale(image: &GrayImage, factor: f32, filter: FilterType) -> GrayImage {
    let width = ((image.width() as f32 * factor).round() as u32).max(1);
    let height = ((image.height() as f32 * factor).round() as u32).max(1);
    imageops::resize(image, width, height, filter)
}

/// Tonal inverse (white text becomes black, black becomes white)
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut img = image.clone();
    imageops::invert(&mut img);
    img
}

/// Pixels strictly above `level` become foreground
pub fn threshold(image: &GrayImage, level: u8) -> GrayImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([FG])
        } else {
            Luma([BG])
        }
    })
}

/// Binary thresholding (Otsu's method)
pub fn otsu(image: &GrayImage) -> GrayImage {
    threshold(image, otsu_level(image))
}

/// Gaussian adaptive threshold: foreground where the pixel exceeds its
/// neighbourhood mean minus `offset`
pub fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let block = block_size.max(3) | 1;
    let sigma = 0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(image, sigma);

    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let value = image.get_pixel(x, y)[0] as i32;
        if value > mean.get_pixel(x, y)[0] as i32 - offset {
            Luma([FG])
        } else {
            Luma([BG])
        }
    })
}

/// Unsharp mask: `img * (1 + strength) - blur(img) * strength`
///
/// The blur is normalized against a blurred flat field so a uniform image
/// keeps its level.
pub fn unsharp(image: &GrayImage, sigma: f32, strength: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(image, sigma);
    let reference = gaussian_blur_f32(&GrayImage::from_pixel(image.width(), image.height(), Luma([FG])), sigma);

    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y)[0] as f32;
        let gain = FG as f32 / (reference.get_pixel(x, y)[0] as f32).max(1.0);
        let b = blurred.get_pixel(x, y)[0] as f32 * gain;
        Luma([(v * (1.0 + strength) - b * strength).round().clamp(0.0, 255.0) as u8])
    })
}

/// Contrast limited adaptive histogram equalization
pub fn clahe(image: &GrayImage, params: ClaheParams) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = params.tiles.max(1).min(width);
    let tiles_y = params.tiles.max(1).min(height);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    // Step 1: Clipped, equalized lookup table per tile
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            let area = ((x1 - x0) * (y1 - y0)).max(1);
            clip_histogram(&mut hist, params.clip_limit, area);

            let lut_scale = 255.0 / area as f32;
            let mut sum = 0u32;
            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            for (i, count) in hist.iter().enumerate() {
                sum += count;
                lut[i] = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    // Step 2: Bilinear interpolation between neighbouring tile tables
    ImageBuffer::from_fn(width, height, |x, y| {
        let v = image.get_pixel(x, y)[0] as usize;

        let txf = x as f32 / tile_w as f32 - 0.5;
        let tyf = y as f32 / tile_h as f32 - 0.5;
        let tx1 = txf.floor();
        let ty1 = tyf.floor();
        let xa = txf - tx1;
        let ya = tyf - ty1;

        let tx1i = (tx1.max(0.0) as u32).min(tiles_x - 1);
        let tx2i = ((tx1 + 1.0).max(0.0) as u32).min(tiles_x - 1);
        let ty1i = (ty1.max(0.0) as u32).min(tiles_y - 1);
        let ty2i = ((ty1 + 1.0).max(0.0) as u32).min(tiles_y - 1);

        let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
        let top = at(tx1i, ty1i) * (1.0 - xa) + at(tx2i, ty1i) * xa;
        let bottom = at(tx1i, ty2i) * (1.0 - xa) + at(tx2i, ty2i) * xa;

        Luma([(top * (1.0 - ya) + bottom * ya).round().clamp(0.0, 255.0) as u8])
    })
}

fn clip_histogram(hist: &mut [u32; 256], clip_limit: f32, area: u32) {
    if clip_limit <= 0.0 {
        return;
    }
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let batch = excess / 256;
    let mut residual = excess - batch * 256;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (256 / residual as usize).max(1);
        let mut i = 0;
        while i < 256 && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

/// Rectangular structuring element with OpenCV's default anchor (`kw / 2`, `kh / 2`)
fn rect_mask(kw: u32, kh: u32) -> Mask {
    let kw = kw.clamp(1, MAX_KERNEL);
    let kh = kh.clamp(1, MAX_KERNEL);
    Mask::from_image(&GrayImage::from_pixel(kw, kh, Luma([FG])), (kw / 2) as u8, (kh / 2) as u8)
}

/// Dilation with a `kw` x `kh` rectangular kernel
pub fn dilate(image: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    if kw <= 1 && kh <= 1 {
        return image.clone();
    }
    grayscale_dilate(image, &rect_mask(kw, kh))
}

/// Erosion with a `kw` x `kh` rectangular kernel
pub fn erode(image: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    if kw <= 1 && kh <= 1 {
        return image.clone();
    }
    grayscale_erode(image, &rect_mask(kw, kh))
}

/// Morphological closing (dilation followed by erosion)
pub fn close(image: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    erode(&dilate(image, kw, kh), kw, kh)
}

/// Morphological opening (erosion followed by dilation)
pub fn open(image: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    dilate(&erode(image, kw, kh), kw, kh)
}

/// Number of foreground pixels
pub fn count_foreground(image: &GrayImage) -> usize {
    image.pixels().filter(|p| p[0] > 0).count()
}
