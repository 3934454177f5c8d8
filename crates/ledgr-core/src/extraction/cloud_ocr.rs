//! Cloud OCR provider for Google Vision style `images:annotate` endpoints.

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::debug;

use super::{ProviderOutput, TextProvider};
use crate::error::ProviderError;
use crate::models::config::CloudOcrConfig;

/// Confidence used when the service reports no page confidence.
pub const CLOUD_DEFAULT_CONFIDENCE: f32 = 0.9;

/// Document text detection through a hosted OCR service.
pub struct CloudOcrProvider {
    config: CloudOcrConfig,
    client: reqwest::Client,
}

impl CloudOcrProvider {
    pub fn new(config: CloudOcrConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

fn request_body(bytes: &[u8]) -> Value {
    json!({
        "requests": [{
            "image": { "content": STANDARD.encode(bytes) },
            "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
        }]
    })
}

/// Read text and mean page confidence from an annotate response.
pub fn annotation_text(body: &Value) -> Result<(String, f32), ProviderError> {
    let response = body
        .pointer("/responses/0")
        .ok_or_else(|| ProviderError::Request("response has no results".to_string()))?;

    if let Some(message) = response.pointer("/error/message").and_then(Value::as_str) {
        return Err(ProviderError::Request(message.to_string()));
    }

    let annotation = response.get("fullTextAnnotation");
    let text = annotation
        .and_then(|a| a.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyText);
    }

    let scores: Vec<f64> = annotation
        .and_then(|a| a.get("pages"))
        .and_then(Value::as_array)
        .map(|pages| {
            pages
                .iter()
                .filter_map(|p| p.get("confidence").and_then(Value::as_f64))
                .collect()
        })
        .unwrap_or_default();

    let confidence = if scores.is_empty() {
        CLOUD_DEFAULT_CONFIDENCE
    } else {
        (scores.iter().sum::<f64>() / scores.len() as f64) as f32
    };
    Ok((text.to_string(), confidence))
}

#[async_trait]
impl TextProvider for CloudOcrProvider {
    fn name(&self) -> &'static str {
        "cloud_ocr"
    }

    fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn extract(
        &self,
        bytes: &[u8],
        _filename_hint: Option<&str>,
    ) -> Result<ProviderOutput, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable(self.name().to_string()))?;
        let start = Instant::now();

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("key", api_key)])
            .json(&request_body(bytes))
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!("{}: {}", status, body.trim())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(format!("invalid JSON: {}", e)))?;
        let (text, confidence) = annotation_text(&body)?;
        debug!("cloud OCR returned {} chars", text.len());

        Ok(ProviderOutput::new(
            text,
            confidence,
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_confidence_is_averaged() {
        let body = json!({"responses": [{"fullTextAnnotation": {
            "text": "Receipt No: 42",
            "pages": [{"confidence": 0.9}, {"confidence": 0.7}]
        }}]});
        let (text, confidence) = annotation_text(&body).unwrap();
        assert_eq!(text, "Receipt No: 42");
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_default_confidence() {
        let body = json!({"responses": [{"fullTextAnnotation": {"text": "hello"}}]});
        assert_eq!(annotation_text(&body).unwrap().1, CLOUD_DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_service_error() {
        let body = json!({"responses": [{"error": {"message": "quota exceeded"}}]});
        assert_eq!(
            annotation_text(&body),
            Err(ProviderError::Request("quota exceeded".to_string()))
        );
        assert_eq!(
            annotation_text(&json!({"responses": [{}]})),
            Err(ProviderError::EmptyText)
        );
    }

    #[test]
    fn test_request_body() {
        let body = request_body(b"abc");
        assert_eq!(body["requests"][0]["image"]["content"], "YWJj");
    }
}
