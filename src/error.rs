use thiserror::Error;

/// Errors raised by the OCR worker
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("decode_failed")]
    Decode(#[from] image::ImageError),

    #[error("recognizer timed out after {0} ms")]
    RecognitionTimeout(u64),

    #[error("recognizer failed: {0}")]
    Recognizer(String),

    #[error("no numeric candidate found")]
    NoCandidate,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for OcrError {
    fn from(err: serde_json::Error) -> Self {
        OcrError::MalformedRequest(err.to_string())
    }
}

impl From<base64::DecodeError> for OcrError {
    fn from(err: base64::DecodeError) -> Self {
        OcrError::MalformedRequest(format!("invalid base64: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_message_is_protocol_code() {
        let err = image::load_from_memory(b"not an image").unwrap_err();
        let err = OcrError::from(err);

        assert_eq!(err.to_string(), "decode_failed");
    }

    #[test]
    fn test_json_error_maps_to_malformed_request() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();

        match OcrError::from(err) {
            OcrError::MalformedRequest(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected MalformedRequest, got {:?}", other),
        }
    }
}
