//! In-process store backed by `parking_lot` locks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentSource, LedgerStore, Notifier};
use crate::duplicate::InvoiceRecord;
use crate::error::{Result, StoreError};
use crate::journal;
use crate::models::{
    EntryStatus, ExtractionResult, IncomingDocument, JournalEntry, JournalLine, Owner,
};
use crate::review::{ReviewItem, ReviewStatus};

#[derive(Default)]
struct Inner {
    documents: HashMap<Uuid, IncomingDocument>,
    archived: HashMap<Uuid, String>,
    extractions: HashMap<Uuid, Vec<ExtractionResult>>,
    entries: Vec<JournalEntry>,
    invoices: Vec<InvoiceRecord>,
    reviews: Vec<ReviewItem>,
}

impl Inner {
    /// Check that a referenced document exists and belongs to `owner`.
    fn owned_document(
        &self,
        owner: &Owner,
        id: Uuid,
    ) -> std::result::Result<&IncomingDocument, StoreError> {
        let doc = self.documents.get(&id).ok_or_else(|| not_found("document", id))?;
        if doc.owner != *owner {
            return Err(StoreError::CrossTenant(format!("document {}", id)));
        }
        Ok(doc)
    }

    fn entry_mut(
        &mut self,
        owner: &Owner,
        id: Uuid,
    ) -> std::result::Result<&mut JournalEntry, StoreError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id && e.owner == *owner)
            .ok_or_else(|| not_found("journal entry", id))
    }
}

fn not_found(kind: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// Thread-safe in-memory [`LedgerStore`] and [`DocumentSource`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    contents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the bytes behind a content handle.
    pub fn put_content(&self, handle: impl Into<String>, bytes: Vec<u8>) {
        self.contents.write().insert(handle.into(), bytes);
    }
}

#[async_trait]
impl DocumentSource for MemoryStore {
    async fn fetch(&self, document: &IncomingDocument) -> std::result::Result<Vec<u8>, StoreError> {
        self.contents
            .read()
            .get(&document.content_handle)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "content",
                id: document.content_handle.clone(),
            })
    }
}

impl LedgerStore for MemoryStore {
    fn save_document(&self, document: &IncomingDocument) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.documents.get(&document.id) {
            if existing.owner != document.owner {
                return Err(StoreError::CrossTenant(format!("document {}", document.id)).into());
            }
            return Ok(());
        }
        inner.documents.insert(document.id, document.clone());
        Ok(())
    }

    fn document(&self, owner: &Owner, id: Uuid) -> Result<IncomingDocument> {
        let inner = self.inner.read();
        match inner.documents.get(&id) {
            Some(doc) if doc.owner == *owner => Ok(doc.clone()),
            _ => Err(not_found("document", id).into()),
        }
    }

    fn archive_document(&self, owner: &Owner, id: Uuid, reason: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.owned_document(owner, id)?;
        inner.archived.insert(id, reason.to_string());
        debug!("Archived document {}: {}", id, reason);
        Ok(())
    }

    fn archive_reason(&self, owner: &Owner, id: Uuid) -> Result<Option<String>> {
        let inner = self.inner.read();
        match inner.documents.get(&id) {
            Some(doc) if doc.owner == *owner => Ok(inner.archived.get(&id).cloned()),
            _ => Err(not_found("document", id).into()),
        }
    }

    fn save_extraction(&self, owner: &Owner, result: &ExtractionResult) -> Result<()> {
        let mut inner = self.inner.write();
        inner.owned_document(owner, result.document_id)?;

        let versions = inner.extractions.entry(result.document_id).or_default();
        if versions.iter().any(|v| v.version == result.version) {
            return Err(StoreError::Conflict(format!(
                "extraction {} v{}",
                result.document_id, result.version
            ))
            .into());
        }
        versions.push(result.clone());
        Ok(())
    }

    fn latest_extraction(
        &self,
        owner: &Owner,
        document_id: Uuid,
    ) -> Result<Option<ExtractionResult>> {
        let inner = self.inner.read();
        match inner.documents.get(&document_id) {
            Some(doc) if doc.owner == *owner => Ok(inner
                .extractions
                .get(&document_id)
                .and_then(|versions| versions.iter().max_by_key(|v| v.version))
                .cloned()),
            _ => Err(not_found("document", document_id).into()),
        }
    }

    fn create_entry(&self, entry: JournalEntry) -> Result<JournalEntry> {
        self.create_entry_with_record(entry, None)
    }

    fn create_entry_with_record(
        &self,
        entry: JournalEntry,
        record: Option<InvoiceRecord>,
    ) -> Result<JournalEntry> {
        entry.check_balance()?;

        let mut inner = self.inner.write();
        if let Some(doc) = entry.source_document {
            inner.owned_document(&entry.owner, doc)?;
        }
        if inner.entries.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::Conflict(format!("journal entry {}", entry.id)).into());
        }
        if let Some(record) = &record {
            if record.owner != entry.owner {
                return Err(StoreError::CrossTenant(format!("invoice record {}", record.id)).into());
            }
            if let Some(doc) = record.document_id {
                inner.owned_document(&record.owner, doc)?;
            }
        }

        // Every check has passed; both writes land under the same lock.
        inner.entries.push(entry.clone());
        inner.invoices.extend(record);
        Ok(entry)
    }

    fn entry(&self, owner: &Owner, id: Uuid) -> Result<JournalEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .find(|e| e.id == id && e.owner == *owner)
            .cloned()
            .ok_or_else(|| not_found("journal entry", id).into())
    }

    fn entries(&self, owner: &Owner) -> Result<Vec<JournalEntry>> {
        Ok(self
            .inner
            .read()
            .entries
            .iter()
            .filter(|e| e.owner == *owner)
            .cloned()
            .collect())
    }

    fn reverse_entry(&self, owner: &Owner, id: Uuid, date: NaiveDate) -> Result<JournalEntry> {
        let mut inner = self.inner.write();
        let original = inner.entry_mut(owner, id)?;
        let reversal = journal::reversal_of(original, date)?;
        original.status = EntryStatus::Reversed;
        inner.entries.push(reversal.clone());
        Ok(reversal)
    }

    fn replace_draft_lines(
        &self,
        owner: &Owner,
        id: Uuid,
        lines: Vec<JournalLine>,
    ) -> Result<JournalEntry> {
        let mut inner = self.inner.write();
        let entry = inner.entry_mut(owner, id)?;
        journal::replace_draft_lines(entry, lines)?;
        Ok(entry.clone())
    }

    fn post_entry(&self, owner: &Owner, id: Uuid) -> Result<JournalEntry> {
        let mut inner = self.inner.write();
        let entry = inner.entry_mut(owner, id)?;
        journal::post_entry(entry)?;
        Ok(entry.clone())
    }

    fn record_invoice(&self, record: InvoiceRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(doc) = record.document_id {
            inner.owned_document(&record.owner, doc)?;
        }
        inner.invoices.push(record);
        Ok(())
    }

    fn invoice_history(&self, owner: &Owner) -> Result<Vec<InvoiceRecord>> {
        Ok(self
            .inner
            .read()
            .invoices
            .iter()
            .filter(|r| r.owner == *owner)
            .cloned()
            .collect())
    }

    fn enqueue_review(&self, item: ReviewItem) -> Result<ReviewItem> {
        let mut inner = self.inner.write();
        inner.owned_document(&item.owner, item.document_id)?;

        if let Some(existing) = inner
            .reviews
            .iter()
            .find(|r| r.document_id == item.document_id)
        {
            debug!("Document {} already queued as {}", item.document_id, existing.id);
            return Ok(existing.clone());
        }
        inner.reviews.push(item.clone());
        Ok(item)
    }

    fn review(&self, owner: &Owner, id: Uuid) -> Result<ReviewItem> {
        self.inner
            .read()
            .reviews
            .iter()
            .find(|r| r.id == id && r.owner == *owner)
            .cloned()
            .ok_or_else(|| not_found("review item", id).into())
    }

    fn update_review(&self, item: &ReviewItem, expected: ReviewStatus) -> Result<()> {
        let mut inner = self.inner.write();
        let stored = inner
            .reviews
            .iter_mut()
            .find(|r| r.id == item.id)
            .ok_or_else(|| not_found("review item", item.id))?;

        if stored.owner != item.owner {
            return Err(StoreError::CrossTenant(format!("review item {}", item.id)).into());
        }
        if stored.status != expected {
            return Err(StoreError::Conflict(format!("review item {}", item.id)).into());
        }
        *stored = item.clone();
        Ok(())
    }

    fn open_reviews(&self, owner: &Owner) -> Result<Vec<ReviewItem>> {
        let mut open: Vec<ReviewItem> = self
            .inner
            .read()
            .reviews
            .iter()
            .filter(|r| r.owner == *owner && !r.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
        });
        Ok(open)
    }
}

/// Notifier that keeps every event, for inspection.
#[derive(Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, event: &str, payload: Value) {
        self.events.lock().push((event.to_string(), payload));
    }
}
