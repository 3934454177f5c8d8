//! Incoming documents and the raw extraction result shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema-less field map produced by the field extractors.
///
/// Missing fields are absent, never null.
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// Tenant scope every entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Accountant (tenant) owning the client.
    pub accountant_id: Uuid,
    /// Accounting client the record belongs to.
    pub client_id: Uuid,
}

impl Owner {
    pub fn new(accountant_id: Uuid, client_id: Uuid) -> Self {
        Self {
            accountant_id,
            client_id,
        }
    }
}

/// Channel a document arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Email,
    Upload,
    Api,
}

/// A document submitted for processing. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingDocument {
    pub id: Uuid,
    pub owner: Owner,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
    /// Opaque handle understood by the storage collaborator.
    pub content_handle: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub received_at: DateTime<Utc>,
}

impl IncomingDocument {
    /// Create a document with a fresh ID.
    pub fn new(
        owner: Owner,
        channel: Channel,
        content_handle: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            channel,
            sender_phone: None,
            sender_email: None,
            content_handle: content_handle.into(),
            filename: filename.into(),
            metadata: BTreeMap::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_sender_phone(mut self, phone: impl Into<String>) -> Self {
        self.sender_phone = Some(phone.into());
        self
    }

    pub fn with_sender_email(mut self, email: impl Into<String>) -> Self {
        self.sender_email = Some(email.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Kind of financial or KYC document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Receipt,
    Pan,
    Aadhaar,
    GstCertificate,
    BankStatement,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Receipt => "receipt",
            DocumentType::Pan => "pan",
            DocumentType::Aadhaar => "aadhaar",
            DocumentType::GstCertificate => "gst_certificate",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::Other => "other",
        }
    }

    /// Whether the document can produce a journal entry.
    pub fn is_financial(&self) -> bool {
        matches!(self, DocumentType::Invoice | DocumentType::Receipt)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document type with the classifier's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub confidence: f32,
}

impl Classification {
    pub fn new(doc_type: DocumentType, confidence: f32) -> Self {
        Self {
            doc_type,
            confidence,
        }
    }
}

/// One provider attempt made by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Normalized output of text extraction, classification and field extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: Uuid,
    /// Incremented each time a correction restarts the pipeline.
    pub version: u32,
    pub classification: Classification,
    pub fields: FieldMap,
    /// Per-field confidence reported by the extractor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_confidence: BTreeMap<String, f32>,
    pub raw_text: String,
    /// Confidence of the provider that produced `raw_text`.
    pub confidence: f32,
    /// Provider that produced `raw_text`, absent when every provider failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionResult {
    /// Build the next version of this result with reviewer-corrected fields.
    pub fn corrected(&self, fields: FieldMap) -> Self {
        let field_confidence = fields.keys().map(|k| (k.clone(), 1.0)).collect();
        Self {
            document_id: self.document_id,
            version: self.version + 1,
            classification: self.classification,
            fields,
            field_confidence,
            raw_text: self.raw_text.clone(),
            confidence: 1.0,
            provider: Some("reviewer".to_string()),
            attempts: self.attempts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_extension() {
        let owner = Owner::new(Uuid::new_v4(), Uuid::new_v4());
        let doc = IncomingDocument::new(owner, Channel::Upload, "blob-1", "Invoice_March.PDF");
        assert_eq!(doc.extension(), Some("pdf".to_string()));
    }

    #[test]
    fn test_classification_serializes_type_key() {
        let c = Classification::new(DocumentType::GstCertificate, 0.9);
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["type"], "gst_certificate");
    }

    #[test]
    fn test_corrected_bumps_version() {
        let result = ExtractionResult {
            document_id: Uuid::new_v4(),
            version: 1,
            classification: Classification::new(DocumentType::Invoice, 0.95),
            fields: FieldMap::new(),
            field_confidence: BTreeMap::new(),
            raw_text: "text".to_string(),
            confidence: 0.7,
            provider: Some("local_ocr".to_string()),
            attempts: Vec::new(),
        };
        let mut fields = FieldMap::new();
        fields.insert("invoice_number".to_string(), "INV-1".into());

        let next = result.corrected(fields);
        assert_eq!(next.version, 2);
        assert_eq!(next.field_confidence.get("invoice_number"), Some(&1.0));
        assert_eq!(next.provider.as_deref(), Some("reviewer"));
    }
}
