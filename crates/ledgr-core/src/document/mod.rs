//! Document classification and per-type field extraction.

pub mod classifier;
pub mod parsers;
pub mod rules;

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::models::{DocumentType, FieldMap};

pub use classifier::classify;
pub use parsers::{
    BankStatementParser, GstCertificateParser, IdentityParser, InvoiceParser, ReceiptParser,
};
use rules::normalize_text;

/// Fields pulled from raw text, with the confidence of each match.
///
/// Missing fields are absent from both maps, never null-filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFields {
    pub fields: FieldMap,
    pub confidence: BTreeMap<String, f32>,
}

impl ParsedFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field value and its match confidence.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>, confidence: f32) {
        self.fields.insert(key.to_string(), value.into());
        self.confidence.insert(key.to_string(), confidence);
    }

    /// Record a flag that carries no confidence of its own.
    pub fn flag(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parser for one document type.
pub trait DocumentParser {
    /// Extract fields from normalized text.
    fn parse(&self, text: &str) -> ParsedFields;
}

/// Extract structured fields from raw text for the given document type.
///
/// Text is normalized before matching. `Other` yields an empty map.
pub fn extract_fields(raw_text: &str, doc_type: DocumentType) -> ParsedFields {
    let text = normalize_text(raw_text);

    let parsed = match doc_type {
        DocumentType::Invoice => InvoiceParser::new().parse(&text),
        DocumentType::Receipt => ReceiptParser::new().parse(&text),
        DocumentType::Pan => IdentityParser::pan().parse(&text),
        DocumentType::Aadhaar => IdentityParser::aadhaar().parse(&text),
        DocumentType::GstCertificate => GstCertificateParser::new().parse(&text),
        DocumentType::BankStatement => BankStatementParser::new().parse(&text),
        DocumentType::Other => ParsedFields::new(),
    };

    debug!(
        "Extracted {} fields from {} document",
        parsed.len(),
        doc_type.as_str()
    );
    parsed
}
