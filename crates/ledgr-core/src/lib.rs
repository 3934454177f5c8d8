//! Core library for turning scanned GST documents into ledger entries.
//!
//! This crate provides:
//! - Text extraction with ordered provider fallback (PDF text, local OCR,
//!   vision model, cloud OCR)
//! - Document classification and per-type field extraction
//! - GST compliance validation and weighted confidence scoring
//! - Duplicate invoice detection
//! - Balanced double-entry journal generation
//! - A human review queue and the pipeline tying it all together

pub mod confidence;
pub mod document;
pub mod duplicate;
pub mod error;
pub mod extraction;
pub mod journal;
pub mod models;
pub mod pipeline;
pub mod review;
pub mod store;
pub mod validation;

pub use confidence::{ConfidenceReport, ConfidenceScorer, FieldScore, FieldStatus, ReviewBand};
pub use document::{ParsedFields, classify, extract_fields};
pub use duplicate::{
    DuplicateDetectionResult, DuplicateDetector, DuplicateMatch, InvoiceRecord, Suggestion,
};
pub use error::{JournalError, LedgrError, ProviderError, Result, ReviewError, StoreError};
pub use extraction::{ExtractionOrchestrator, ProviderOutput, TextProvider};
pub use journal::{JournalGenerator, determine_kind};
pub use models::config::LedgrConfig;
pub use models::{
    Channel, Classification, DocumentType, EntryStatus, EntryType, ExtractionResult, FieldMap,
    IncomingDocument, InvoiceData, InvoiceKind, JournalEntry, JournalLine, Owner,
};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use review::{Priority, ReviewItem, ReviewStatus};
pub use store::{
    DocumentSource, FileSource, LedgerStore, MemoryNotifier, MemoryStore, Notifier,
    TracingNotifier,
};
pub use validation::{Severity, ValidationEngine, ValidationReport};
