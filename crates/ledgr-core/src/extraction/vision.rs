//! Vision-language model provider over an OpenAI-compatible chat API.

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::debug;

use super::{ProviderOutput, TextProvider, image_mime};
use crate::error::ProviderError;
use crate::models::config::VisionModelConfig;

/// Fixed confidence for model transcriptions, which carry no score.
pub const VISION_CONFIDENCE: f32 = 0.85;

const TRANSCRIBE_PROMPT: &str = "Transcribe all text in this document exactly as printed, \
preserving line breaks and table rows. Do not summarize or add commentary.";

/// Sends the document image to a multimodal chat model for transcription.
pub struct VisionModelProvider {
    config: VisionModelConfig,
    client: reqwest::Client,
}

impl VisionModelProvider {
    pub fn new(config: VisionModelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, bytes: &[u8]) -> Value {
        let data_uri = format!("data:{};base64,{}", image_mime(bytes), STANDARD.encode(bytes));
        json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": TRANSCRIBE_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_uri } }
                ]
            }]
        })
    }
}

/// Pull the transcription out of a chat completions response.
pub fn completion_text(body: &Value) -> Result<String, ProviderError> {
    let text = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Request("response has no message content".to_string()))?;

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyText);
    }
    Ok(text.to_string())
}

#[async_trait]
impl TextProvider for VisionModelProvider {
    fn name(&self) -> &'static str {
        "vision_model"
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
            .bearer_auth(api_key)
            .json(&self.request_body(bytes))
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
        let text = completion_text(&body)?;
        debug!("vision model returned {} chars", text.len());

        Ok(ProviderOutput::new(
            text,
            VISION_CONFIDENCE,
            start.elapsed().as_millis() as u64,
        ))
    }
}
