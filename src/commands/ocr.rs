use base64::Engine as _;
use serde_json::Value;
use std::sync::Arc;

use crate::error::OcrError;
use crate::models::config::{DebugConfig, WorkerConfig};
use crate::models::protocol::{recover_id, OcrKind, OcrRequest, OcrResponse};
use crate::services::diagnostics::{DiagnosticSink, DirectorySink, NullSink};
use crate::services::ocr::engine::TextRecognizer;
use crate::services::ocr::pipeline::OcrPipeline;

const PERCENT_UNIT: &str = "%";

/// Handles one request line at a time
pub struct OcrService {
    pipeline: OcrPipeline,
    debug: DebugConfig,
}

impl OcrService {
    pub fn new(config: &WorkerConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            pipeline: OcrPipeline::new(config, recognizer),
            debug: config.debug.clone(),
        }
    }

    /// Decode a region and run the pipeline selected by `kind`
    pub fn process(&self, png: &[u8], kind: &OcrKind, sink: &dyn DiagnosticSink) -> Result<OcrResponse, OcrError> {
        let region = image::load_from_memory(png)?.to_rgb8();

        let response = match kind {
            OcrKind::Exp => {
                let decision = self.pipeline.read_exp(&region, sink);
                // No value still answers with the best-effort raw text
                let error = match decision.value {
                    Some(_) => None,
                    None => {
                        let err = OcrError::NoCandidate;
                        tracing::debug!(raw = %decision.raw_text, error = %err, "exp reading has no value");
                        Some(err.to_string())
                    }
                };
                OcrResponse {
                    id: Value::Null,
                    ok: error.is_none(),
                    value: decision.formatted_value(),
                    raw: Some(decision.raw_text),
                    unit: Some(PERCENT_UNIT.to_string()),
                    error,
                }
            }
            other => {
                let reading = self.pipeline.read_text(other, &region, sink);
                let ok = match other {
                    OcrKind::EnemyHp => !reading.raw_text.is_empty(),
                    _ => true,
                };
                OcrResponse {
                    id: Value::Null,
                    ok,
                    raw: Some(reading.raw_text),
                    value: reading.value,
                    unit: None,
                    error: None,
                }
            }
        };

        Ok(response)
    }

    /// Handle one protocol line; blank lines produce no response
    pub fn handle_line(&self, line: &str) -> Option<OcrResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match self.handle_request(line) {
            Ok(response) => response,
            Err(err) => {
                let id = recover_id(line);
                match &err {
                    OcrError::Decode(e) => tracing::warn!(id = %id, error = %e, "image decode failed"),
                    _ => tracing::warn!(id = %id, error = %err, "request failed"),
                }
                OcrResponse::failure(id, err.to_string())
            }
        };

        Some(response)
    }

    fn handle_request(&self, line: &str) -> Result<OcrResponse, OcrError> {
        let request: OcrRequest = serde_json::from_str(line)?;
        let png = match request.png_b64.as_deref() {
            Some(b64) if !b64.is_empty() => base64::engine::general_purpose::STANDARD.decode(b64.trim())?,
            _ => Vec::new(),
        };
        let kind = OcrKind::from_request(request.kind.as_deref());

        let started = std::time::Instant::now();
        let mut response = if self.debug.enabled {
            let sink = DirectorySink::new(&self.debug.resolved_dir(), &request.id.to_string());
            self.process(&png, &kind, &sink)?
        } else {
            self.process(&png, &kind, &NullSink)?
        };
        response.id = request.id;

        tracing::info!(
            id = %response.id,
            kind = ?kind,
            ok = response.ok,
            value = ?response.value,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request processed"
        );

        Ok(response)
    }
}
