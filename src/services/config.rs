use crate::error::OcrError;
use crate::models::config::WorkerConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment overrides applied on top of the config file
pub const ENV_TESSERACT_EXE: &str = "TESSERACT_EXE";
pub const ENV_TESSDATA_PREFIX: &str = "TESSDATA_PREFIX";
pub const ENV_DEBUG: &str = "EXP_OCR_DEBUG";
pub const ENV_DEBUG_DIR: &str = "EXP_OCR_DEBUG_DIR";

/// Configuration manager for worker settings
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for the platform config file
    /// (`<config_dir>/exp-ocr-worker/config.json`)
    pub fn new() -> Result<Self, OcrError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| OcrError::Config("failed to determine config directory".to_string()))?
            .join("exp-ocr-worker");
        let config_path = config_dir.join("config.json");

        Ok(Self {
            config_dir,
            config_path,
        })
    }

    /// Create a manager for an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let config_path = path.into();
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            config_dir,
            config_path,
        }
    }

    /// Save configuration to disk
    pub fn save(&self, config: &WorkerConfig) -> Result<(), OcrError> {
        fs::create_dir_all(&self.config_dir)?;

        // Pretty print for human editing
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| OcrError::Config(format!("failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, json)?;

        Ok(())
    }

    /// Load configuration from disk
    ///
    /// If the config file doesn't exist, returns the default configuration
    pub fn load(&self) -> Result<WorkerConfig, OcrError> {
        if !self.config_exists() {
            return Ok(WorkerConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)?;

        serde_json::from_str(&content).map_err(|e| {
            OcrError::Config(format!("failed to parse {}: {}", self.config_path.display(), e))
        })
    }

    /// Get the config file path
    pub fn config_file_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Check if config file exists
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}

/// Apply overrides from `lookup` (the process environment in production)
pub fn apply_env_overrides<F>(config: &mut WorkerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(exe) = lookup(ENV_TESSERACT_EXE).filter(|v| !v.trim().is_empty()) {
        config.recognizer.tesseract_exe = exe;
    }
    if let Some(dir) = lookup(ENV_TESSDATA_PREFIX).filter(|v| !v.trim().is_empty()) {
        config.recognizer.tessdata_dir = Some(PathBuf::from(dir));
    }
    if let Some(flag) = lookup(ENV_DEBUG) {
        config.debug.enabled = matches!(flag.trim(), "1" | "true" | "TRUE" | "yes");
    }
    if let Some(dir) = lookup(ENV_DEBUG_DIR).filter(|v| !v.trim().is_empty()) {
        config.debug.dir = Some(PathBuf::from(dir));
    }
}
