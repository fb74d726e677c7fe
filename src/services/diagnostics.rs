//! Request-scoped debug artifact persistence.

use image::{GrayImage, RgbImage};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Requests seen by directory sinks since startup
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Receives intermediate images of one request
pub trait DiagnosticSink: Send + Sync {
    fn record_region(&self, label: &str, region: &RgbImage);

    fn record_mask(&self, label: &str, mask: &GrayImage);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record_region(&self, _label: &str, _region: &RgbImage) {}

    fn record_mask(&self, _label: &str, _mask: &GrayImage) {}
}

/// Writes `NNNN_<label>.png` files into a per-request subdirectory
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    counter: AtomicU32,
}

impl DirectorySink {
    /// Create `<base>/<timestamp>_<seq>_<request id>`; write failures are logged only
    pub fn new(base: &Path, request_id: &str) -> Self {
        let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let dir = base.join(format!("{}_{:04}_{}", stamp, seq, sanitize(request_id)));

        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to create debug directory");
        }

        Self {
            dir,
            counter: AtomicU32::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self, label: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("{:04}_{}.png", n, sanitize(label)))
    }
}

impl DiagnosticSink for DirectorySink {
    fn record_region(&self, label: &str, region: &RgbImage) {
        let path = self.next_path(label);
        if let Err(e) = region.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write debug image");
        }
    }

    fn record_mask(&self, label: &str, mask: &GrayImage) {
        let path = self.next_path(label);
        if let Err(e) = mask.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write debug image");
        }
    }
}

/// Keeps labels and dimensions in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, u32, u32)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.records.lock().iter().map(|(label, _, _)| label.clone()).collect()
    }

    pub fn records(&self) -> Vec<(String, u32, u32)> {
        self.records.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record_region(&self, label: &str, region: &RgbImage) {
        self.records
            .lock()
            .push((label.to_string(), region.width(), region.height()));
    }

    fn record_mask(&self, label: &str, mask: &GrayImage) {
        self.records
            .lock()
            .push((label.to_string(), mask.width(), mask.height()));
    }
}

/// File-name safe rendering of an arbitrary label or request id
fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .take(48)
        .collect();
    if cleaned.is_empty() {
        "anon".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to create a unique temporary base directory
    fn create_test_base() -> PathBuf {
        use std::sync::atomic::AtomicUsize;
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("exp-ocr-debug-test-{}-{}", std::process::id(), id));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("warm_5.0"), "warm_5.0");
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize(""), "anon");
    }

    #[test]
    fn test_directory_sink_writes_numbered_files() {
        let base = create_test_base();
        let sink = DirectorySink::new(&base, "\"req-1\"");

        sink.record_region("input", &RgbImage::new(8, 4));
        sink.record_mask("warm_5.0", &GrayImage::new(40, 20));

        assert!(sink.dir().starts_with(&base));
        assert!(sink.dir().to_string_lossy().ends_with("_req-1_"));
        assert!(sink.dir().join("0000_input.png").exists(), "Region should be written first");
        assert!(sink.dir().join("0001_warm_5.0.png").exists());

        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record_region("input", &RgbImage::new(8, 4));
        sink.record_mask("otsu_5.0", &GrayImage::new(40, 20));

        assert_eq!(sink.labels(), vec!["input", "otsu_5.0"]);
        assert_eq!(sink.records()[1], ("otsu_5.0".to_string(), 40, 20));
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        sink.record_region("input", &RgbImage::new(1, 1));
        sink.record_mask("mask", &GrayImage::new(1, 1));
    }
}
