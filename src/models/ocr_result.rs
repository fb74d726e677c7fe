use serde::{Deserialize, Serialize};

/// Raw output of one recognizer call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionResult {
    pub raw_text: String,
    pub source_mask_label: String,
}

/// Recognition result with its parsed value and quality score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCandidate {
    pub raw_text: String,
    pub parsed_value: Option<f64>,
    pub score: i32,
    pub label: String,
}

/// Final answer for one region
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub value: Option<f64>,
    pub raw_text: String,
}

impl Decision {
    pub fn empty(raw_text: impl Into<String>) -> Self {
        Self {
            value: None,
            raw_text: raw_text.into(),
        }
    }

    /// Value with exactly four fractional digits
    pub fn formatted_value(&self) -> Option<String> {
        self.value.map(|v| format!("{:.4}", v))
    }
}

/// Outcome of a free-text kind (names, levels, hit points)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextReading {
    pub raw_text: String,
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_value_has_four_decimals() {
        let decision = Decision {
            value: Some(50.0),
            raw_text: "50%".to_string(),
        };
        assert_eq!(decision.formatted_value().as_deref(), Some("50.0000"));

        let decision = Decision {
            value: Some(4.97984),
            raw_text: String::new(),
        };
        assert_eq!(decision.formatted_value().as_deref(), Some("4.9798"));
    }

    #[test]
    fn test_empty_decision() {
        let decision = Decision::empty("??");
        assert!(decision.formatted_value().is_none());
        assert_eq!(decision.raw_text, "??");
    }
}
