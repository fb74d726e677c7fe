pub mod engine;
pub mod fill;
pub mod masks;
pub mod parser;
pub mod pipeline;
pub mod preprocessing;
pub mod scorer;
pub mod tesseract;

// Re-export main types
pub use engine::{PageSegMode, RecognizeOptions, TextRecognizer};
pub use parser::{parse_exp_percent, parse_hp, parse_level};
pub use pipeline::OcrPipeline;
pub use tesseract::TesseractCli;
