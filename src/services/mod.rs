pub mod config;
pub mod diagnostics;
pub mod ocr;
pub mod worker;
