use image::{DynamicImage, GrayImage};
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::engine::{RecognizeOptions, TextRecognizer};
use crate::error::OcrError;
use crate::models::config::RecognizerConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Tesseract engine driven through its command line (PNG on stdin, text on stdout)
#[derive(Debug, Clone)]
pub struct TesseractCli {
    exe: String,
    tessdata_dir: Option<PathBuf>,
    lang: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(config: &RecognizerConfig) -> Self {
        Self {
            exe: config.tesseract_exe.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
            lang: config.lang.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// First line of `tesseract --version`
    pub fn version(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.exe)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| OcrError::Recognizer(format!("failed to run {}: {}", self.exe, e)))?;

        // Older releases print the banner on stderr
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        text.lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| OcrError::Recognizer("empty version output".to_string()))
    }

    fn build_args(&self, options: &RecognizeOptions) -> Vec<String> {
        let mut args = vec!["stdin".to_string(), "stdout".to_string()];

        if let Some(dir) = &self.tessdata_dir {
            args.push("--tessdata-dir".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }

        args.push("-l".to_string());
        args.push(self.lang.clone());
        args.push("--oem".to_string());
        args.push("3".to_string());
        args.push("--psm".to_string());
        args.push(options.mode.as_psm().to_string());

        if let Some(whitelist) = options.whitelist.as_deref().filter(|w| !w.is_empty()) {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", whitelist));
        }

        args
    }

    fn encode_png(image: &GrayImage) -> Result<Vec<u8>, OcrError> {
        let mut bytes: Vec<u8> = Vec::new();
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| OcrError::Recognizer(format!("failed to encode image: {}", e)))?;
        Ok(bytes)
    }
}

/// Kill and reap a child that will not be waited on normally
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &GrayImage, options: &RecognizeOptions) -> Result<String, OcrError> {
        let png = Self::encode_png(image)?;

        let mut child = Command::new(&self.exe)
            .args(self.build_args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| OcrError::Recognizer(format!("failed to spawn {}: {}", self.exe, e)))?;

        // Pipes are serviced on their own threads so a full buffer cannot stall the deadline
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Recognizer("stdin unavailable".to_string()))?;
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(&png);
        });

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| OcrError::Recognizer("stdout unavailable".to_string()))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    stop(&mut child);
                    return Err(e.into());
                }
            }
            if Instant::now() >= deadline {
                stop(&mut child);
                return Err(OcrError::RecognitionTimeout(self.timeout.as_millis() as u64));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let _ = writer.join();
        let output = reader
            .join()
            .map_err(|_| OcrError::Recognizer("stdout reader panicked".to_string()))?;

        if !status.success() {
            return Err(OcrError::Recognizer(format!("tesseract exited with {}", status)));
        }

        String::from_utf8(output).map_err(|e| OcrError::Recognizer(format!("invalid utf-8 output: {}", e)))
    }
}
