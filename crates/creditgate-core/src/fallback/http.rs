//! Gemini-style `generateContent` invoker.

use std::time::Duration;

use async_trait::async_trait;
use creditgate_types::models::ProviderConfig;
use creditgate_types::{ConfigError, GeneratedOutput, GenerationPayload, InvokeMode, ModelErrorKind};
use serde_json::{json, Value};
use url::Url;

use super::{InvokeError, ModelInvoker};
use crate::error::AppResult;

/// Upstream statuses worth one retry on the same candidate.
pub const TRANSIENT_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 529];

/// Phrases in a 400 body that mean the structured-output request itself was refused.
const UNSUPPORTED_MODE_MARKERS: &[&str] =
    &["responseMimeType", "response_mime_type", "responseSchema", "JSON mode"];

/// Map a non-success status and body to an error class.
pub fn classify_status(status: u16, body: &str) -> ModelErrorKind {
    if TRANSIENT_STATUS_CODES.contains(&status) {
        return ModelErrorKind::Transient;
    }
    if status == 400 && UNSUPPORTED_MODE_MARKERS.iter().any(|m| body.contains(m)) {
        return ModelErrorKind::UnsupportedMode;
    }
    ModelErrorKind::Fatal
}

pub struct HttpModelInvoker {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpModelInvoker {
    pub fn new(config: &ProviderConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::invalid("provider.base_url", e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, base_url, api_key: config.api_key.clone() })
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            model_id
        )
    }

    /// Request body for one call. `units` becomes `candidateCount`.
    pub fn build_body(payload: &GenerationPayload, mode: InvokeMode) -> Value {
        let mut prompt = payload.prompt.clone();
        if let Some(category) = &payload.category {
            prompt.push_str(&format!("\nCategory: {category}"));
        }
        if let Some(size) = &payload.size {
            prompt.push_str(&format!("\nSize: {size}"));
        }
        if !payload.extra.is_empty() {
            prompt.push_str(&format!("\nOptions: {}", Value::Object(payload.extra.clone())));
        }

        let mut generation_config = json!({ "candidateCount": payload.units.max(1) });
        if mode == InvokeMode::Enhanced {
            generation_config["responseMimeType"] = json!("application/json");
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": generation_config
        })
    }

    /// One output per candidate: the candidate's inline image if present,
    /// otherwise its concatenated text.
    pub fn extract_outputs(response: &Value) -> Vec<GeneratedOutput> {
        let Some(candidates) = response.get("candidates").and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut outputs = Vec::new();
        for candidate in candidates {
            let Some(parts) = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
            else {
                continue;
            };

            let image = parts.iter().find_map(|part| {
                let inline = part.get("inlineData")?;
                let data = inline.get("data").and_then(Value::as_str).filter(|d| !d.is_empty())?;
                let mime_type =
                    inline.get("mimeType").and_then(Value::as_str).unwrap_or("image/png");
                Some(GeneratedOutput::Image {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                })
            });
            if let Some(image) = image {
                outputs.push(image);
                continue;
            }

            let text: String =
                parts.iter().filter_map(|part| part.get("text").and_then(Value::as_str)).collect();
            if !text.trim().is_empty() {
                outputs.push(GeneratedOutput::Text { text });
            }
        }
        outputs
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    async fn invoke(
        &self,
        model_id: &str,
        payload: &GenerationPayload,
        mode: InvokeMode,
    ) -> Result<Vec<GeneratedOutput>, InvokeError> {
        let response = self
            .client
            .post(self.endpoint(model_id))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_body(payload, mode))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    InvokeError::transient(format!("transport: {e}"))
                } else {
                    InvokeError::fatal(format!("transport: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = classify_status(status.as_u16(), &body);
            return Err(InvokeError::new(kind, format!("upstream {status}: {body}")));
        }

        let json: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InvokeError::transient(format!("body: {e}"))
            } else {
                InvokeError::fatal(format!("invalid response body: {e}"))
            }
        })?;

        let outputs = Self::extract_outputs(&json);
        if outputs.is_empty() {
            return Err(InvokeError::empty(format!("{model_id} returned 200 without outputs")));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(503, ""), ModelErrorKind::Transient);
        assert_eq!(classify_status(429, "quota"), ModelErrorKind::Transient);
        assert_eq!(
            classify_status(400, r#"{"error":{"message":"responseMimeType is not supported"}}"#),
            ModelErrorKind::UnsupportedMode
        );
        assert_eq!(classify_status(400, "prompt blocked"), ModelErrorKind::Fatal);
        assert_eq!(classify_status(404, "model not found"), ModelErrorKind::Fatal);
    }

    #[test]
    fn test_enhanced_body_requests_json() {
        let payload = GenerationPayload::new("spring sale").with_units(3);

        let enhanced = HttpModelInvoker::build_body(&payload, InvokeMode::Enhanced);
        assert_eq!(enhanced["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(enhanced["generationConfig"]["candidateCount"], 3);

        let plain = HttpModelInvoker::build_body(&payload, InvokeMode::Plain);
        assert!(plain["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_extract_outputs() {
        let response = json!({
            "candidates": [
                { "content": { "parts": [{ "inlineData": { "mimeType": "image/jpeg", "data": "QUJD" } }] } },
                { "content": { "parts": [{ "text": "Buy " }, { "text": "now" }] } },
                { "content": { "parts": [] } },
                { "finishReason": "SAFETY" }
            ]
        });
        let outputs = HttpModelInvoker::extract_outputs(&response);

        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs[0],
            GeneratedOutput::Image { mime_type: "image/jpeg".to_string(), data: "QUJD".to_string() }
        );
        assert_eq!(outputs[1], GeneratedOutput::Text { text: "Buy now".to_string() });
    }
}
