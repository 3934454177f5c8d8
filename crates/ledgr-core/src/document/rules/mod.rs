//! Rule-based field extractors for Indian financial and KYC documents.

pub mod aadhaar;
pub mod amounts;
pub mod dates;
pub mod gstin;
pub mod pan;
pub mod patterns;

pub use aadhaar::{AadhaarExtractor, mask_aadhaar, validate_aadhaar};
pub use amounts::{first_labeled_amount, normalize_text, parse_indian_amount};
pub use dates::{DateExtractor, first_labeled_date};
pub use gstin::{Gstin, GstinExtractor, compute_check_char, state_name, validate_gstin};
pub use pan::{PanExtractor, holder_type};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Confidence of a value taken from the most specific labeled pattern.
pub const LABELED_CONFIDENCE: f32 = 0.95;
/// Confidence of a value taken from a less specific labeled pattern.
pub const FALLBACK_CONFIDENCE: f32 = 0.85;
/// Confidence of a value found without a label.
pub const STANDALONE_CONFIDENCE: f32 = 0.7;
/// Confidence of a value computed from other fields.
pub const DERIVED_CONFIDENCE: f32 = 0.6;

/// Extraction context with confidence scores.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExtractionMatch<U> {
        ExtractionMatch {
            value: f(self.value),
            confidence: self.confidence,
            position: self.position,
            source: self.source,
        }
    }
}

/// Confidence for the pattern at `index` in an ordered pattern list.
pub(crate) fn ordered_confidence(index: usize) -> f32 {
    if index == 0 {
        LABELED_CONFIDENCE
    } else {
        FALLBACK_CONFIDENCE
    }
}

/// Return the first capture of the first matching pattern.
pub(crate) fn first_capture(
    patterns: &[regex::Regex],
    text: &str,
) -> Option<ExtractionMatch<String>> {
    patterns.iter().enumerate().find_map(|(i, re)| {
        let caps = re.captures(text)?;
        let value = caps.get(1)?;
        let trimmed = value.as_str().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(
            ExtractionMatch::new(trimmed.to_string(), ordered_confidence(i), value.as_str())
                .with_position(value.start(), value.end()),
        )
    })
}
