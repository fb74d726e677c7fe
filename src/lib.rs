pub mod commands;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

pub use commands::ocr::OcrService;
pub use error::OcrError;
pub use models::config::WorkerConfig;
pub use models::protocol::{OcrKind, OcrRequest, OcrResponse};
pub use services::ocr::{TesseractCli, TextRecognizer};
pub use services::worker::WorkerStats;

/// Install the stderr subscriber (stdout carries the protocol)
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Serve stdin/stdout with the tesseract-backed pipeline until input closes
pub async fn run(config: WorkerConfig) -> Result<WorkerStats, OcrError> {
    let tesseract = TesseractCli::new(&config.recognizer);
    match tesseract.version() {
        Ok(version) => tracing::info!(exe = %config.recognizer.tesseract_exe, %version, "recognizer available"),
        Err(e) => tracing::warn!(
            exe = %config.recognizer.tesseract_exe,
            error = %e,
            "recognizer probe failed; requests will return empty readings"
        ),
    }

    if config.debug.enabled {
        tracing::info!(dir = %config.debug.resolved_dir().display(), "debug images enabled");
    }

    let service = Arc::new(OcrService::new(&config, Arc::new(tesseract)));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    services::worker::run(service, stdin, stdout).await
}
