use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::str::FromStr;

/// One request line
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OcrRequest {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub png_b64: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// One response line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrResponse {
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl OcrResponse {
    pub fn failure(id: Value, error: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            raw: None,
            value: None,
            unit: None,
            error: Some(error.into()),
        }
    }
}

/// What a region contains, selecting the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrKind {
    /// Percentage readout ("exp" or "digits")
    Exp,
    /// Name and level line ("namelevel" or "line")
    NameLevel,
    /// Level number ("lvl")
    Level,
    CharName,
    /// "current/max" hit points ("enemyhp")
    EnemyHp,
    /// Multi-word scrolling text ("lauftext")
    Lauftext,
    /// Anything else: plain grayscale line
    Other(String),
}

impl FromStr for OcrKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = s.trim().to_lowercase();
        Ok(match kind.as_str() {
            "" | "exp" | "digits" => OcrKind::Exp,
            "namelevel" | "line" => OcrKind::NameLevel,
            "lvl" => OcrKind::Level,
            "charname" => OcrKind::CharName,
            "enemyhp" => OcrKind::EnemyHp,
            "lauftext" => OcrKind::Lauftext,
            _ => OcrKind::Other(kind),
        })
    }
}

impl OcrKind {
    /// Kind named by a request, defaulting to `Exp`
    pub fn from_request(kind: Option<&str>) -> Self {
        kind.and_then(|k| k.parse().ok()).unwrap_or(OcrKind::Exp)
    }
}

/// Extract the request id from a line that may not fully deserialize
pub fn recover_id(line: &str) -> Value {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null)
}
