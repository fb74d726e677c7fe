//! Line-delimited request/response loop.

use std::any::Any;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::commands::ocr::OcrService;
use crate::error::OcrError;
use crate::models::protocol::{recover_id, OcrResponse};

/// Counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub requests: u64,
    pub failures: u64,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Serve requests from `reader` until end of input, one at a time.
/// Each request runs on a blocking task so a panic fails only its own line.
pub async fn run<R, W>(service: Arc<OcrService>, mut reader: R, mut writer: W) -> Result<WorkerStats, OcrError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = WorkerStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        // Invalid UTF-8 fails its own line, not the stream
        let line = String::from_utf8_lossy(&buf).into_owned();
        if line.trim().is_empty() {
            continue;
        }

        let svc = service.clone();
        let task_line = line.clone();
        let response = match tokio::task::spawn_blocking(move || svc.handle_line(&task_line)).await {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => {
                let message = if e.is_panic() {
                    format!("internal error: {}", panic_message(&*e.into_panic()))
                } else {
                    format!("internal error: {}", e)
                };
                tracing::error!(error = %message, "request task failed");
                OcrResponse::failure(recover_id(&line), message)
            }
        };

        stats.requests += 1;
        if !response.ok {
            stats.failures += 1;
        }

        let mut out = serde_json::to_vec(&response).map_err(std::io::Error::from)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    tracing::info!(requests = stats.requests, failures = stats.failures, "input closed");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::WorkerConfig;
    use crate::services::ocr::engine::{RecognizeOptions, TextRecognizer};
    use base64::Engine as _;
    use image::{DynamicImage, GrayImage, Rgb, RgbImage};
    use serde_json::{json, Value};

    struct ConstantRecognizer(&'static str);

    impl TextRecognizer for ConstantRecognizer {
        fn recognize(&self, _image: &GrayImage, _options: &RecognizeOptions) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    /// Panics on every call
    struct ExplodingRecognizer;

    impl TextRecognizer for ExplodingRecognizer {
        fn recognize(&self, _image: &GrayImage, _options: &RecognizeOptions) -> Result<String, OcrError> {
            panic!("recognizer exploded");
        }
    }

    fn png_b64() -> String {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 12, Rgb([8, 8, 8])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn run_lines(service: OcrService, input: &str) -> (WorkerStats, Vec<Value>) {
        let mut output: Vec<u8> = Vec::new();
        let stats = tokio_test::block_on(run(Arc::new(service), input.as_bytes(), &mut output)).unwrap();

        let responses = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (stats, responses)
    }

    #[test]
    fn test_stream_processes_lines_in_order() {
        let service = OcrService::new(&WorkerConfig::default(), Arc::new(ConstantRecognizer("12.5%")));
        let input = format!(
            "{}\n\n{}\n",
            json!({"id": 1, "png_b64": png_b64()}),
            json!({"id": 2, "png_b64": png_b64(), "kind": "exp"})
        );

        let (stats, responses) = run_lines(service, &input);

        assert_eq!(stats, WorkerStats { requests: 2, failures: 0 });
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[1]["id"], json!(2));
        assert_eq!(responses[1]["value"], json!("12.5000"));
    }

    #[test]
    fn test_malformed_line_does_not_stop_loop() {
        let service = OcrService::new(&WorkerConfig::default(), Arc::new(ConstantRecognizer("12.5%")));
        let input = format!("not json at all\n{}\n", json!({"id": "b", "png_b64": png_b64()}));

        let (stats, responses) = run_lines(service, &input);

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["ok"], json!(false));
        assert!(responses[0]["error"].is_string());
        assert_eq!(responses[1]["ok"], json!(true));
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_invalid_utf8_line_does_not_stop_loop() {
        let service = OcrService::new(&WorkerConfig::default(), Arc::new(ConstantRecognizer("12.5%")));
        let mut input: Vec<u8> = br#"{"id":1,"png_b64":""#.to_vec();
        input.extend_from_slice(&[0xff, 0xfe]);
        input.extend_from_slice(b"\"}\n\xff\xfe\n");
        input.extend_from_slice(format!("{}\n", json!({"id": 3, "png_b64": png_b64()})).as_bytes());

        let mut output: Vec<u8> = Vec::new();
        let stats = tokio_test::block_on(run(Arc::new(service), input.as_slice(), &mut output))
            .expect("Invalid UTF-8 should not end the stream");
        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 3, "Every line should get a response");
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[0]["ok"], json!(false));
        assert_eq!(responses[1]["id"], Value::Null);
        assert_eq!(responses[1]["ok"], json!(false));
        assert_eq!(responses[2]["id"], json!(3));
        assert_eq!(responses[2]["ok"], json!(true));
        assert_eq!(stats, WorkerStats { requests: 3, failures: 2 });
    }

    #[test]
    fn test_panic_becomes_error_response() {
        let service = OcrService::new(&WorkerConfig::default(), Arc::new(ExplodingRecognizer));
        let input = format!("{}\n", json!({"id": 42, "png_b64": png_b64()}));

        let (stats, responses) = run_lines(service, &input);

        assert_eq!(stats.failures, 1);
        assert_eq!(responses[0]["id"], json!(42));
        assert_eq!(responses[0]["ok"], json!(false));
        assert!(responses[0]["error"].as_str().unwrap().contains("recognizer exploded"));
    }

    #[test]
    fn test_empty_input() {
        let service = OcrService::new(&WorkerConfig::default(), Arc::new(ConstantRecognizer("")));
        let (stats, responses) = run_lines(service, "");

        assert_eq!(stats, WorkerStats::default());
        assert!(responses.is_empty());
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&5u8), "unknown panic");
    }
}
