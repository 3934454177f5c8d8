//! Text extraction providers and the fallback orchestrator.
//!
//! Providers are tried strictly in priority order. A provider that is
//! unavailable, fails, or exceeds its time budget hands over to the next
//! one; the orchestrator itself never fails.

pub mod cloud_ocr;
#[cfg(feature = "native")]
pub mod local_ocr;
pub mod pdf_text;
pub mod vision;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::document::{classify, extract_fields};
use crate::error::ProviderError;
use crate::models::config::{ExtractionConfig, ProviderKind};
use crate::models::{
    Classification, DocumentType, ExtractionAttempt, ExtractionResult, FieldMap, IncomingDocument,
};

pub use cloud_ocr::CloudOcrProvider;
#[cfg(feature = "native")]
pub use local_ocr::LocalOcrProvider;
pub use pdf_text::PdfTextProvider;
pub use vision::VisionModelProvider;

/// Confidence reported when every provider failed.
pub const DEGRADED_CONFIDENCE: f32 = 0.1;

/// Text produced by one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub text: String,
    /// Provider-reported confidence in [0, 1].
    pub confidence: f32,
    pub time_ms: u64,
}

impl ProviderOutput {
    pub fn new(text: impl Into<String>, confidence: f32, time_ms: u64) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            time_ms,
        }
    }
}

/// A text extraction backend.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Stable provider name used in attempt records.
    fn name(&self) -> &'static str;

    /// Whether the provider is configured and its resources are present.
    fn is_available(&self) -> bool;

    /// Turn document bytes into text.
    async fn extract(
        &self,
        bytes: &[u8],
        filename_hint: Option<&str>,
    ) -> Result<ProviderOutput, ProviderError>;
}

/// Whether the bytes look like a PDF file.
pub fn is_pdf(bytes: &[u8], filename_hint: Option<&str>) -> bool {
    bytes.starts_with(b"%PDF")
        || filename_hint.is_some_and(|f| f.to_lowercase().ends_with(".pdf"))
}

/// Guess an image MIME type from magic bytes.
pub fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        "image/jpeg"
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP") {
        "image/webp"
    } else if bytes.starts_with(b"%PDF") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

/// Winning provider output plus the attempts that led to it.
#[derive(Debug, Clone)]
pub struct TextOutcome {
    pub provider: Option<&'static str>,
    pub output: Option<ProviderOutput>,
    pub attempts: Vec<ExtractionAttempt>,
}

/// Ordered provider chain with a per-provider time budget.
pub struct ExtractionOrchestrator {
    providers: Vec<Box<dyn TextProvider>>,
    timeout: Duration,
}

impl ExtractionOrchestrator {
    /// Create an orchestrator from an explicit provider list.
    pub fn new(providers: Vec<Box<dyn TextProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Build the provider chain listed in the configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .filter_map(|kind| build_provider(*kind, config))
            .collect();
        Self::new(providers, Duration::from_millis(config.provider_timeout_ms))
    }

    /// Append a provider at the lowest priority.
    pub fn with_provider(mut self, provider: Box<dyn TextProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run the provider chain until one produces text.
    pub async fn extract_text(&self, bytes: &[u8], filename_hint: Option<&str>) -> TextOutcome {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            let start = Instant::now();

            let result = if !provider.is_available() {
                Err(ProviderError::Unavailable(name.to_string()))
            } else {
                match tokio::time::timeout(self.timeout, provider.extract(bytes, filename_hint))
                    .await
                {
                    Ok(Ok(output)) if output.text.trim().is_empty() => {
                        Err(ProviderError::EmptyText)
                    }
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(self.timeout.as_millis() as u64)),
                }
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    info!(
                        "{} extracted {} chars (confidence {:.2}) in {}ms",
                        name,
                        output.text.len(),
                        output.confidence,
                        elapsed_ms
                    );
                    attempts.push(ExtractionAttempt {
                        provider: name.to_string(),
                        error: None,
                        elapsed_ms,
                    });
                    return TextOutcome {
                        provider: Some(name),
                        output: Some(output),
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("{} failed, falling back: {}", name, e);
                    attempts.push(ExtractionAttempt {
                        provider: name.to_string(),
                        error: Some(e.to_string()),
                        elapsed_ms,
                    });
                }
            }
        }

        TextOutcome {
            provider: None,
            output: None,
            attempts,
        }
    }

    /// Extract, classify and parse a document. Never fails: when every
    /// provider fails the result is typed `other` with confidence 0.1 and
    /// `fields.error` lists each provider's reason.
    pub async fn extract(&self, document: &IncomingDocument, bytes: &[u8]) -> ExtractionResult {
        let filename = Some(document.filename.as_str()).filter(|f| !f.is_empty());
        let outcome = self.extract_text(bytes, filename).await;

        match (outcome.provider, outcome.output) {
            (Some(provider), Some(output)) => {
                let classification = classify(&output.text, filename);
                let parsed = extract_fields(&output.text, classification.doc_type);
                info!(
                    "Document {} classified as {} ({:.2}), {} fields",
                    document.id,
                    classification.doc_type,
                    classification.confidence,
                    parsed.len()
                );

                ExtractionResult {
                    document_id: document.id,
                    version: 1,
                    classification,
                    fields: parsed.fields,
                    field_confidence: parsed.confidence,
                    raw_text: output.text,
                    confidence: output.confidence,
                    provider: Some(provider.to_string()),
                    attempts: outcome.attempts,
                }
            }
            _ => {
                warn!(
                    "All {} providers failed for document {}",
                    outcome.attempts.len(),
                    document.id
                );
                degraded_result(document, outcome.attempts)
            }
        }
    }
}

fn degraded_result(
    document: &IncomingDocument,
    attempts: Vec<ExtractionAttempt>,
) -> ExtractionResult {
    let reasons: Vec<Value> = attempts
        .iter()
        .map(|a| {
            Value::from(format!(
                "{}: {}",
                a.provider,
                a.error.as_deref().unwrap_or("no text")
            ))
        })
        .collect();

    let mut fields = FieldMap::new();
    fields.insert(
        "error".to_string(),
        if reasons.is_empty() {
            Value::from("no extraction providers configured")
        } else {
            Value::Array(reasons)
        },
    );

    ExtractionResult {
        document_id: document.id,
        version: 1,
        classification: Classification::new(DocumentType::Other, DEGRADED_CONFIDENCE),
        fields,
        field_confidence: Default::default(),
        raw_text: String::new(),
        confidence: DEGRADED_CONFIDENCE,
        provider: None,
        attempts,
    }
}

fn build_provider(kind: ProviderKind, config: &ExtractionConfig) -> Option<Box<dyn TextProvider>> {
    match kind {
        ProviderKind::PdfText => Some(Box::new(PdfTextProvider::new(config.min_pdf_text_length))),
        #[cfg(feature = "native")]
        ProviderKind::LocalOcr => Some(Box::new(LocalOcrProvider::new(config.local_ocr.clone()))),
        #[cfg(not(feature = "native"))]
        ProviderKind::LocalOcr => {
            warn!("local_ocr requested but the native feature is disabled");
            None
        }
        ProviderKind::VisionModel => {
            Some(Box::new(VisionModelProvider::new(config.vision_model.clone())))
        }
        ProviderKind::CloudOcr => Some(Box::new(CloudOcrProvider::new(config.cloud_ocr.clone()))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted providers for orchestrator and pipeline tests.

    use super::*;

    pub enum Script {
        Text(&'static str, f32),
        Fail(ProviderError),
        Unavailable,
        Hang,
    }

    pub struct ScriptedProvider {
        pub name: &'static str,
        pub script: Script,
    }

    impl ScriptedProvider {
        pub fn boxed(name: &'static str, script: Script) -> Box<dyn TextProvider> {
            Box::new(Self { name, script })
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_available(&self) -> bool {
            !matches!(self.script, Script::Unavailable)
        }

        async fn extract(
            &self,
            _bytes: &[u8],
            _filename_hint: Option<&str>,
        ) -> Result<ProviderOutput, ProviderError> {
            match &self.script {
                Script::Text(text, confidence) => Ok(ProviderOutput::new(*text, *confidence, 1)),
                Script::Fail(e) => Err(e.clone()),
                Script::Unavailable => Err(ProviderError::Unavailable(self.name.to_string())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(ProviderError::EmptyText)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Script, ScriptedProvider};
    use super::*;
    use crate::models::{Channel, Owner};
    use uuid::Uuid;

    fn document(filename: &str) -> IncomingDocument {
        let owner = Owner::new(Uuid::new_v4(), Uuid::new_v4());
        IncomingDocument::new(owner, Channel::Upload, "blob", filename)
    }

    const INVOICE_TEXT: &str = "TAX INVOICE\nInvoice No: INV-9\nGrand Total: 1,180.00\n";

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let orchestrator = ExtractionOrchestrator::new(
            vec![
                ScriptedProvider::boxed(
                    "local_ocr",
                    Script::Fail(ProviderError::Request("model crashed".to_string())),
                ),
                ScriptedProvider::boxed("vision_model", Script::Text(INVOICE_TEXT, 0.82)),
                ScriptedProvider::boxed("cloud_ocr", Script::Text("never used", 0.99)),
            ],
            Duration::from_secs(5),
        );

        let result = orchestrator.extract(&document("scan.jpg"), b"bytes").await;

        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.provider.as_deref(), Some("vision_model"));
        assert_eq!(result.classification.doc_type, DocumentType::Invoice);
        assert_eq!(result.fields["invoice_number"], "INV-9");
        assert_eq!(result.attempts.len(), 2);
        assert!(result.attempts[0].error.as_deref().unwrap().contains("model crashed"));
        assert!(result.attempts[1].error.is_none());
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let orchestrator = ExtractionOrchestrator::new(
            vec![
                ScriptedProvider::boxed("local_ocr", Script::Unavailable),
                ScriptedProvider::boxed(
                    "cloud_ocr",
                    Script::Fail(ProviderError::Request("quota exceeded".to_string())),
                ),
            ],
            Duration::from_secs(5),
        );

        let result = orchestrator.extract(&document("scan.jpg"), b"bytes").await;

        assert_eq!(result.confidence, DEGRADED_CONFIDENCE);
        assert_eq!(result.classification.doc_type, DocumentType::Other);
        assert!(result.provider.is_none());
        let errors = result.fields["error"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].as_str().unwrap().starts_with("local_ocr:"));
        assert!(errors[1].as_str().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_timeout_triggers_fallback() {
        let orchestrator = ExtractionOrchestrator::new(
            vec![
                ScriptedProvider::boxed("slow", Script::Hang),
                ScriptedProvider::boxed("fast", Script::Text("Receipt No: R-1", 0.7)),
            ],
            Duration::from_millis(20),
        );

        let outcome = orchestrator.extract_text(b"bytes", None).await;

        assert_eq!(outcome.provider, Some("fast"));
        assert_eq!(
            outcome.attempts[0].error.as_deref(),
            Some("timed out after 20ms")
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_a_failure() {
        let orchestrator = ExtractionOrchestrator::new(
            vec![
                ScriptedProvider::boxed("blank", Script::Text("   ", 0.9)),
                ScriptedProvider::boxed("good", Script::Text("hello", 0.6)),
            ],
            Duration::from_secs(1),
        );

        let outcome = orchestrator.extract_text(b"bytes", None).await;
        assert_eq!(outcome.provider, Some("good"));
        assert_eq!(outcome.attempts[0].error.as_deref(), Some("no text extracted"));
    }

    #[test]
    fn test_from_config_keeps_order() {
        let config = ExtractionConfig {
            providers: vec![ProviderKind::CloudOcr, ProviderKind::PdfText],
            ..Default::default()
        };
        let orchestrator = ExtractionOrchestrator::from_config(&config);
        assert_eq!(orchestrator.provider_names(), vec!["cloud_ocr", "pdf_text"]);
    }

    #[test]
    fn test_sniffing() {
        assert!(is_pdf(b"%PDF-1.7", None));
        assert!(is_pdf(b"", Some("bill.PDF")));
        assert_eq!(image_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(image_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }
}
