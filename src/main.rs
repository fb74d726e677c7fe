use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use exp_ocr_lib::services::config::{apply_env_overrides, ConfigManager};

/// Line-delimited OCR worker for game HUD readouts
#[derive(Parser, Debug)]
#[command(name = "exp-ocr-worker", version)]
#[command(about = "Reads {id, png_b64, kind} lines on stdin and answers on stdout")]
struct Args {
    /// Path to a JSON config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long)]
    tesseract: Option<String>,

    /// Write intermediate images for every request
    #[arg(long)]
    debug: bool,

    /// Destination for debug images
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    exp_ocr_lib::init_tracing(args.log_json);

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    if args.write_default_config {
        manager.save(&exp_ocr_lib::WorkerConfig::default())?;
        tracing::info!(path = %manager.config_file_path().display(), "default config written");
        return Ok(());
    }

    let mut config = manager.load()?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    // Command line wins over file and environment
    if let Some(exe) = args.tesseract {
        config.recognizer.tesseract_exe = exe;
    }
    if args.debug {
        config.debug.enabled = true;
    }
    if let Some(dir) = args.debug_dir {
        config.debug.dir = Some(dir);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %manager.config_file_path().display(),
        timeout_ms = config.recognizer.timeout_ms,
        "starting exp-ocr-worker"
    );

    let stats = exp_ocr_lib::run(config).await?;
    tracing::info!(requests = stats.requests, failures = stats.failures, "worker stopped");

    Ok(())
}
