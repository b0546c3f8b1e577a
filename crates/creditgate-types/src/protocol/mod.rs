//! Shapes exchanged with the generative model provider.
//!
//! The orchestrator treats "call the model" as opaque: it hands a
//! [`GenerationPayload`] and an [`InvokeMode`] to an invoker and receives
//! either a list of [`GeneratedOutput`] or a [`ModelErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request shape used when calling a candidate model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeMode {
    /// Structured output requested
    Enhanced,
    /// No structured-output request
    Plain,
}

impl fmt::Display for InvokeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeMode::Enhanced => write!(f, "enhanced"),
            InvokeMode::Plain => write!(f, "plain"),
        }
    }
}

/// Classification of a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// Upstream overloaded/unavailable; worth one retry on the same candidate
    Transient,
    /// The structured-output request itself was rejected
    UnsupportedMode,
    /// Successful response without any output payload
    Empty,
    /// Anything else; move on to the next candidate
    Fatal,
}

impl ModelErrorKind {
    /// Whether the failure is expected to clear up on its own.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Stable label used for metrics and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::UnsupportedMode => "unsupported_mode",
            Self::Empty => "empty",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-provided generation request, minus the identity and quota concerns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    /// Asset category (banner type, copy channel, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Keyword or free-form prompt
    pub prompt: String,
    /// Requested output size, e.g. `1200x628`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Number of units the model is asked to produce
    #[serde(default = "default_units")]
    pub units: u32,
    /// Remaining request fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

const fn default_units() -> u32 {
    1
}

impl GenerationPayload {
    /// Create a payload for a single unit.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), units: 1, ..Self::default() }
    }

    /// Return a copy asking for `units` outputs.
    pub fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }
}

/// One chargeable unit returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedOutput {
    /// Text output (ad copy, chat reply, structured JSON as text)
    Text {
        /// Generated text
        text: String,
    },
    /// Inline binary output (banner image)
    Image {
        /// MIME type of the payload
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Base64-encoded image bytes
        data: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_flattens_extra_fields() {
        let json = serde_json::json!({
            "prompt": "summer sale",
            "category": "banner",
            "size": "1200x628",
            "tone": "playful"
        });
        let payload: GenerationPayload = serde_json::from_value(json).expect("payload parses");

        assert_eq!(payload.prompt, "summer sale");
        assert_eq!(payload.units, 1);
        assert_eq!(payload.extra.get("tone").and_then(|v| v.as_str()), Some("playful"));
    }

    #[test]
    fn test_output_serializes_with_type_tag() {
        let image = GeneratedOutput::Image { mime_type: "image/png".to_string(), data: "AA==".to_string() };
        let value = serde_json::to_value(&image).expect("serializes");
        assert_eq!(value["type"], "image");
        assert_eq!(value["mimeType"], "image/png");
    }
}
