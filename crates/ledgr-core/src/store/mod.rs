//! Collaborator seams: document bytes, persistence and notifications.
//!
//! Every write is scoped by an [`Owner`]; a write that references an entity
//! belonging to another tenant fails with [`StoreError::CrossTenant`]. Reads
//! across tenants behave as if the record did not exist.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::duplicate::InvoiceRecord;
use crate::error::{Result, StoreError};
use crate::models::{ExtractionResult, IncomingDocument, JournalEntry, JournalLine, Owner};
use crate::review::{ReviewItem, ReviewStatus};

pub use memory::{MemoryNotifier, MemoryStore};

/// Fetches raw document bytes by content handle.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, document: &IncomingDocument) -> std::result::Result<Vec<u8>, StoreError>;
}

/// Persistence for documents, extractions, journals, history and reviews.
pub trait LedgerStore: Send + Sync {
    /// Insert a document. Re-saving the same document is a no-op.
    fn save_document(&self, document: &IncomingDocument) -> Result<()>;

    fn document(&self, owner: &Owner, id: Uuid) -> Result<IncomingDocument>;

    /// Mark a document archived, e.g. as a rejected duplicate.
    fn archive_document(&self, owner: &Owner, id: Uuid, reason: &str) -> Result<()>;

    fn archive_reason(&self, owner: &Owner, id: Uuid) -> Result<Option<String>>;

    /// Store an extraction version. Versions are append-only.
    fn save_extraction(&self, owner: &Owner, result: &ExtractionResult) -> Result<()>;

    fn latest_extraction(
        &self,
        owner: &Owner,
        document_id: Uuid,
    ) -> Result<Option<ExtractionResult>>;

    /// Persist a new entry. Unbalanced entries are refused.
    fn create_entry(&self, entry: JournalEntry) -> Result<JournalEntry>;

    /// Persist an entry together with the invoice it books. Either both
    /// are stored or neither is.
    fn create_entry_with_record(
        &self,
        entry: JournalEntry,
        record: Option<InvoiceRecord>,
    ) -> Result<JournalEntry>;

    fn entry(&self, owner: &Owner, id: Uuid) -> Result<JournalEntry>;

    fn entries(&self, owner: &Owner) -> Result<Vec<JournalEntry>>;

    /// Mark a posted entry reversed and persist its reversing entry in one step.
    fn reverse_entry(&self, owner: &Owner, id: Uuid, date: NaiveDate) -> Result<JournalEntry>;

    /// Swap the lines of a draft entry in one step.
    fn replace_draft_lines(
        &self,
        owner: &Owner,
        id: Uuid,
        lines: Vec<JournalLine>,
    ) -> Result<JournalEntry>;

    fn post_entry(&self, owner: &Owner, id: Uuid) -> Result<JournalEntry>;

    fn record_invoice(&self, record: InvoiceRecord) -> Result<()>;

    fn invoice_history(&self, owner: &Owner) -> Result<Vec<InvoiceRecord>>;

    /// Enqueue an item, or return the item already queued for its document.
    fn enqueue_review(&self, item: ReviewItem) -> Result<ReviewItem>;

    fn review(&self, owner: &Owner, id: Uuid) -> Result<ReviewItem>;

    /// Replace a stored item if its status is still `expected`.
    fn update_review(&self, item: &ReviewItem, expected: ReviewStatus) -> Result<()>;

    /// Open items (pending, in review or escalated), highest priority then
    /// oldest first.
    fn open_reviews(&self, owner: &Owner) -> Result<Vec<ReviewItem>>;
}

/// Fire-and-forget event sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &str, payload: Value);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &str, payload: Value) {
        info!("Notify {}: {}", event, payload);
    }
}

/// Reads document bytes from the local filesystem, treating the content
/// handle as a path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

#[async_trait]
impl DocumentSource for FileSource {
    async fn fetch(&self, document: &IncomingDocument) -> std::result::Result<Vec<u8>, StoreError> {
        tokio::fs::read(&document.content_handle)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", document.content_handle, e)))
    }
}
