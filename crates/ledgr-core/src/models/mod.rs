//! Data models shared across the pipeline.

pub mod config;
pub mod document;
pub mod invoice;
pub mod journal;

pub use document::{
    Channel, Classification, DocumentType, ExtractionAttempt, ExtractionResult, FieldMap,
    IncomingDocument, Owner,
};
pub use invoice::{InvoiceData, InvoiceKind, InvoiceLine, SupplyType};
pub use journal::{EntryStatus, EntryType, JournalEntry, JournalLine};
