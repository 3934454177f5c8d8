//! Configuration structures for the document-to-ledger pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main configuration for the ledgr pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgrConfig {
    /// Text extraction provider chain.
    pub extraction: ExtractionConfig,

    /// Validation engine limits and tolerances.
    pub validation: ValidationConfig,

    /// Confidence scoring thresholds.
    pub scoring: ScoringConfig,

    /// Duplicate detection thresholds.
    pub duplicates: DuplicateConfig,
}

/// Text extraction providers, tried in the listed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Embedded text in digital PDFs.
    PdfText,
    /// PaddleOCR models run locally.
    LocalOcr,
    /// Vision-language model over HTTP.
    VisionModel,
    /// Cloud OCR service.
    CloudOcr,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::PdfText => "pdf_text",
            ProviderKind::LocalOcr => "local_ocr",
            ProviderKind::VisionModel => "vision_model",
            ProviderKind::CloudOcr => "cloud_ocr",
        }
    }
}

/// Extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Provider priority order.
    pub providers: Vec<ProviderKind>,

    /// Time budget for a single provider call in milliseconds.
    pub provider_timeout_ms: u64,

    /// Minimum embedded text length for a PDF to count as digital.
    pub min_pdf_text_length: usize,

    /// Local OCR model settings.
    pub local_ocr: LocalOcrConfig,

    /// Vision-language model settings.
    pub vision_model: VisionModelConfig,

    /// Cloud OCR settings.
    pub cloud_ocr: CloudOcrConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderKind::PdfText,
                ProviderKind::LocalOcr,
                ProviderKind::VisionModel,
                ProviderKind::CloudOcr,
            ],
            provider_timeout_ms: 30_000,
            min_pdf_text_length: 50,
            local_ocr: LocalOcrConfig::default(),
            vision_model: VisionModelConfig::default(),
            cloud_ocr: CloudOcrConfig::default(),
        }
    }
}

/// Local PaddleOCR model files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for LocalOcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl LocalOcrConfig {
    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }
}

/// OpenAI-compatible chat completions endpoint with image input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionModelConfig {
    pub endpoint: String,
    pub model: String,
    /// Provider is unavailable while this is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for VisionModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
        }
    }
}

/// Google Vision style `images:annotate` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudOcrConfig {
    pub endpoint: String,
    /// Provider is unavailable while this is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for CloudOcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key: None,
        }
    }
}

/// Validation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Grand total above which the buyer GSTIN is mandatory.
    pub buyer_gstin_threshold: Decimal,

    /// Oldest accepted invoice date, in days before today.
    pub max_invoice_age_days: i64,

    /// Latest accepted due date, in days after the invoice date.
    pub max_due_days: i64,

    /// Allowed CGST/SGST difference.
    pub split_tolerance: Decimal,

    /// Allowed difference between computed and printed grand total.
    pub arithmetic_tolerance: Decimal,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            buyer_gstin_threshold: Decimal::from(250_000),
            max_invoice_age_days: 365,
            max_due_days: 183,
            split_tolerance: Decimal::new(5, 1),
            arithmetic_tolerance: Decimal::ONE,
        }
    }
}

/// Confidence scorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum weighted score for automatic posting.
    pub auto_approve_threshold: f32,

    /// Below this score review is required rather than recommended.
    pub needs_review_threshold: f32,

    /// Below this score review items are escalated.
    pub escalation_confidence: f32,

    /// Grand total above which review is always forced.
    pub high_value_amount: Decimal,

    /// Grand total above which review items are escalated.
    pub escalation_amount: Decimal,

    /// More than this many invalid warning-level fields forces review.
    pub max_warning_fields: usize,

    /// Weight of the text provider's confidence in the weighted score.
    pub provider_weight: f32,

    /// Weight of the classifier's confidence in the weighted score.
    pub classification_weight: f32,

    /// Per-field weights. Only listed fields are scored.
    pub field_weights: BTreeMap<String, f32>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            auto_approve_threshold: 0.85,
            needs_review_threshold: 0.70,
            escalation_confidence: 0.50,
            high_value_amount: Decimal::from(100_000),
            escalation_amount: Decimal::from(1_000_000),
            max_warning_fields: 2,
            provider_weight: 2.0,
            classification_weight: 1.0,
            field_weights: default_field_weights(),
        }
    }
}

fn default_field_weights() -> BTreeMap<String, f32> {
    use super::invoice::keys;

    [
        (keys::VENDOR_GSTIN, 3.0),
        (keys::GRAND_TOTAL, 3.0),
        (keys::INVOICE_NUMBER, 2.0),
        (keys::INVOICE_DATE, 2.0),
        (keys::SUBTOTAL, 2.0),
        (keys::BUYER_GSTIN, 1.5),
        (keys::CGST, 1.5),
        (keys::SGST, 1.5),
        (keys::IGST, 1.5),
        (keys::VENDOR_NAME, 1.0),
        (keys::BUYER_NAME, 0.5),
        (keys::DUE_DATE, 0.5),
        (keys::PLACE_OF_SUPPLY, 0.5),
        (keys::LINE_ITEMS, 0.5),
    ]
    .into_iter()
    .map(|(k, w)| (k.to_string(), w))
    .collect()
}

/// Duplicate detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Fuzzy matches must score strictly above this.
    pub fuzzy_threshold: f32,

    /// Confidence at or above which the candidate is rejected.
    pub reject_threshold: f32,

    /// Confidence at or above which the candidate is reviewed.
    pub review_threshold: f32,

    /// Exact-match amount tolerance.
    pub amount_tolerance: Decimal,

    /// Relative amount band for fuzzy matching.
    pub fuzzy_amount_band: Decimal,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            reject_threshold: 0.95,
            review_threshold: 0.7,
            amount_tolerance: Decimal::new(1, 2),
            fuzzy_amount_band: Decimal::new(1, 2),
        }
    }
}

impl LedgrConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Check threshold ordering.
    pub fn validate(&self) -> Result<(), crate::error::LedgrError> {
        let s = &self.scoring;
        if !(s.escalation_confidence <= s.needs_review_threshold
            && s.needs_review_threshold <= s.auto_approve_threshold)
        {
            return Err(crate::error::LedgrError::Config(format!(
                "scoring thresholds must satisfy escalation ({}) <= needs_review ({}) <= auto_approve ({})",
                s.escalation_confidence, s.needs_review_threshold, s.auto_approve_threshold
            )));
        }
        if s.field_weights.values().any(|w| *w < 0.0) {
            return Err(crate::error::LedgrError::Config(
                "field weights must not be negative".to_string(),
            ));
        }
        if self.extraction.providers.is_empty() {
            return Err(crate::error::LedgrError::Config(
                "at least one extraction provider is required".to_string(),
            ));
        }
        Ok(())
    }
}
