//! Embedded text extraction for digital PDFs using lopdf and pdf-extract.

use std::time::Instant;

use async_trait::async_trait;
use lopdf::Document;
use tracing::debug;

use super::{ProviderOutput, TextProvider, is_pdf};
use crate::error::ProviderError;

/// Confidence of embedded PDF text.
pub const PDF_TEXT_CONFIDENCE: f32 = 0.95;

/// Reads the text layer of digital PDFs. Scanned PDFs with no text layer
/// fall through to the OCR providers.
pub struct PdfTextProvider {
    min_text_length: usize,
}

impl PdfTextProvider {
    pub fn new(min_text_length: usize) -> Self {
        Self { min_text_length }
    }

    /// Extract the text layer synchronously.
    pub fn extract_text(&self, data: &[u8]) -> Result<String, ProviderError> {
        let raw = load_decrypted(data)?;
        let text = pdf_extract::extract_text_from_mem(&raw)
            .map_err(|e| ProviderError::UnsupportedInput(e.to_string()))?;

        let len = text.trim().chars().count();
        if len < self.min_text_length {
            debug!(
                "PDF text layer has {} chars, below minimum {}",
                len, self.min_text_length
            );
            return Err(ProviderError::EmptyText);
        }
        Ok(text)
    }
}

impl Default for PdfTextProvider {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Load a PDF, decrypting empty-password encryption so pdf-extract can read it.
fn load_decrypted(data: &[u8]) -> Result<Vec<u8>, ProviderError> {
    let mut doc =
        Document::load_mem(data).map_err(|e| ProviderError::UnsupportedInput(e.to_string()))?;

    if doc.get_pages().is_empty() {
        return Err(ProviderError::UnsupportedInput("PDF has no pages".to_string()));
    }

    if !doc.is_encrypted() {
        return Ok(data.to_vec());
    }
    if doc.decrypt("").is_err() {
        return Err(ProviderError::UnsupportedInput(
            "PDF is password protected".to_string(),
        ));
    }
    debug!("Decrypted PDF with empty password");

    let mut decrypted = Vec::new();
    doc.save_to(&mut decrypted).map_err(|e| {
        ProviderError::UnsupportedInput(format!("failed to save decrypted PDF: {}", e))
    })?;
    Ok(decrypted)
}

#[async_trait]
impl TextProvider for PdfTextProvider {
    fn name(&self) -> &'static str {
        "pdf_text"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        bytes: &[u8],
        filename_hint: Option<&str>,
    ) -> Result<ProviderOutput, ProviderError> {
        if !is_pdf(bytes, filename_hint) {
            return Err(ProviderError::UnsupportedInput("not a PDF".to_string()));
        }

        let start = Instant::now();
        let data = bytes.to_vec();
        let provider = Self::new(self.min_text_length);
        let text = tokio::task::spawn_blocking(move || provider.extract_text(&data))
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))??;

        Ok(ProviderOutput::new(
            text,
            PDF_TEXT_CONFIDENCE,
            start.elapsed().as_millis() as u64,
        ))
    }
}
