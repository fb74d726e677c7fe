use image::GrayImage;

use crate::error::OcrError;

/// Tesseract page segmentation modes used by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSegMode {
    /// Uniform block of text (psm 6)
    Block,
    /// Single text line (psm 7)
    SingleLine,
    /// Single word (psm 8)
    SingleWord,
}

impl PageSegMode {
    pub fn as_psm(&self) -> u8 {
        match self {
            PageSegMode::Block => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::SingleWord => 8,
        }
    }
}

/// Per-call recognition options
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeOptions {
    pub whitelist: Option<String>,
    pub mode: PageSegMode,
}

impl RecognizeOptions {
    pub fn line(whitelist: &str) -> Self {
        Self {
            whitelist: Some(whitelist.to_string()),
            mode: PageSegMode::SingleLine,
        }
    }

    pub fn with_mode(mut self, mode: PageSegMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            whitelist: None,
            mode: PageSegMode::SingleLine,
        }
    }
}

/// Text recognizer abstraction: binary raster + character set -> string
pub trait TextRecognizer: Send + Sync {
    /// Recognize a single raster, reporting why a call failed
    fn recognize(&self, image: &GrayImage, options: &RecognizeOptions) -> Result<String, OcrError>;

    /// Recognize and trim; any failure degrades to an empty string
    fn recognize_line(&self, image: &GrayImage, options: &RecognizeOptions) -> String {
        match self.recognize(image, options) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, psm = options.mode.as_psm(), "recognizer call degraded to empty result");
                String::new()
            }
        }
    }
}
