//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ledgr_core::{
    Channel, ExtractionOrchestrator, ExtractionResult, IncomingDocument, InvoiceRecord,
    JournalEntry, JournalLine, LedgerStore, LedgrConfig, MemoryNotifier, MemoryStore, Owner,
    Pipeline, ProviderError, ProviderOutput, Result, ReviewItem, ReviewStatus, StoreError,
    TextProvider,
};
use uuid::Uuid;

pub const CLEAN_INVOICE: &str = "TAX INVOICE
Sold By: Sharma Traders Pvt Ltd
GSTIN: 27AABCU9603R1ZN
Invoice No: INV-2024-001
Invoice Date: 15/03/2024

Bill To: Kulkarni Enterprises
GSTIN: 27AAPFU0939F1ZV
Place of Supply: 27-Maharashtra

Sub Total: 10,000.00
CGST @ 9%: 900.00
SGST @ 9%: 900.00
Grand Total: 11,800.00
";

/// Same invoice with a mistyped vendor GSTIN check character.
pub const BAD_GSTIN_INVOICE: &str = "TAX INVOICE
Sold By: Sharma Traders Pvt Ltd
GSTIN: 27AABCU9603R1ZM
Invoice No: INV-2024-002
Invoice Date: 15/03/2024

Bill To: Kulkarni Enterprises
GSTIN: 27AAPFU0939F1ZV
Place of Supply: 27-Maharashtra

Sub Total: 10,000.00
CGST @ 9%: 900.00
SGST @ 9%: 900.00
Grand Total: 11,800.00
";

/// Provider returning a fixed transcription.
pub struct FixedText {
    pub text: &'static str,
    pub confidence: f32,
}

#[async_trait]
impl TextProvider for FixedText {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        _bytes: &[u8],
        _hint: Option<&str>,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::new(self.text, self.confidence, 3))
    }
}

/// Provider that reads the uploaded bytes as the transcription, so each
/// document can carry its own text.
pub struct Transcript {
    pub confidence: f32,
}

#[async_trait]
impl TextProvider for Transcript {
    fn name(&self) -> &'static str {
        "transcript"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        bytes: &[u8],
        _hint: Option<&str>,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::new(String::from_utf8_lossy(bytes), self.confidence, 3))
    }
}

/// Provider that always fails with a remote error.
pub struct Broken(pub &'static str);

#[async_trait]
impl TextProvider for Broken {
    fn name(&self) -> &'static str {
        self.0
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        _bytes: &[u8],
        _hint: Option<&str>,
    ) -> std::result::Result<ProviderOutput, ProviderError> {
        Err(ProviderError::Request("503 Service Unavailable".to_string()))
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub owner: Owner,
}

impl Harness {
    pub fn new(providers: Vec<Box<dyn TextProvider>>) -> Self {
        Self::with(providers, |p, _| p)
    }

    pub fn text(text: &'static str, confidence: f32) -> Self {
        Self::new(vec![Box::new(FixedText { text, confidence })])
    }

    pub fn with(
        providers: Vec<Box<dyn TextProvider>>,
        configure: impl FnOnce(Pipeline, &Owner) -> Pipeline,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(providers, store.clone(), store, configure)
    }

    /// Harness whose pipeline writes through a [`RefusingStore`].
    pub fn refusing(providers: Vec<Box<dyn TextProvider>>) -> (Self, Arc<RefusingStore>) {
        let store = Arc::new(MemoryStore::new());
        let refusing = Arc::new(RefusingStore::new(store.clone()));
        (Self::build(providers, store, refusing.clone(), |p, _| p), refusing)
    }

    fn build(
        providers: Vec<Box<dyn TextProvider>>,
        store: Arc<MemoryStore>,
        ledger: Arc<dyn LedgerStore>,
        configure: impl FnOnce(Pipeline, &Owner) -> Pipeline,
    ) -> Self {
        let owner = Owner::new(Uuid::new_v4(), Uuid::new_v4());
        let notifier = Arc::new(MemoryNotifier::new());
        let config = LedgrConfig::default();
        let pipeline = Pipeline::new(&config, ledger, store.clone(), notifier.clone())
            .with_orchestrator(ExtractionOrchestrator::new(providers, Duration::from_secs(2)))
            .with_today(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        Self {
            pipeline: configure(pipeline, &owner),
            store,
            notifier,
            owner,
        }
    }

    /// Register content and build a document for it.
    pub fn document(&self, filename: &str) -> IncomingDocument {
        self.upload(filename, b"%PDF-1.7 scanned".to_vec())
    }

    /// Build a document whose upload is `text`, for use with [`Transcript`].
    pub fn document_with_text(&self, filename: &str, text: &str) -> IncomingDocument {
        self.upload(filename, text.as_bytes().to_vec())
    }

    fn upload(&self, filename: &str, bytes: Vec<u8>) -> IncomingDocument {
        let handle = format!("uploads/{}", Uuid::new_v4());
        self.store.put_content(handle.clone(), bytes);
        IncomingDocument::new(self.owner, Channel::Whatsapp, handle, filename)
            .with_sender_phone("+919800000000")
    }
}

/// Store that refuses journal writes while `refuse_entries` is set.
pub struct RefusingStore {
    pub inner: Arc<MemoryStore>,
    pub refuse_entries: AtomicBool,
}

impl RefusingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            refuse_entries: AtomicBool::new(false),
        }
    }

    pub fn refuse(&self, refuse: bool) {
        self.refuse_entries.store(refuse, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.refuse_entries.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("ledger offline".to_string()).into());
        }
        Ok(())
    }
}

impl LedgerStore for RefusingStore {
    fn save_document(&self, document: &IncomingDocument) -> Result<()> {
        self.inner.save_document(document)
    }

    fn document(&self, owner: &Owner, id: Uuid) -> Result<IncomingDocument> {
        self.inner.document(owner, id)
    }

    fn archive_document(&self, owner: &Owner, id: Uuid, reason: &str) -> Result<()> {
        self.inner.archive_document(owner, id, reason)
    }

    fn archive_reason(&self, owner: &Owner, id: Uuid) -> Result<Option<String>> {
        self.inner.archive_reason(owner, id)
    }

    fn save_extraction(&self, owner: &Owner, result: &ExtractionResult) -> Result<()> {
        self.inner.save_extraction(owner, result)
    }

    fn latest_extraction(
        &self,
        owner: &Owner,
        document_id: Uuid,
    ) -> Result<Option<ExtractionResult>> {
        self.inner.latest_extraction(owner, document_id)
    }

    fn create_entry(&self, entry: JournalEntry) -> Result<JournalEntry> {
        self.check()?;
        self.inner.create_entry(entry)
    }

    fn create_entry_with_record(
        &self,
        entry: JournalEntry,
        record: Option<InvoiceRecord>,
    ) -> Result<JournalEntry> {
        self.check()?;
        self.inner.create_entry_with_record(entry, record)
    }

    fn entry(&self, owner: &Owner, id: Uuid) -> Result<JournalEntry> {
        self.inner.entry(owner, id)
    }

    fn entries(&self, owner: &Owner) -> Result<Vec<JournalEntry>> {
        self.inner.entries(owner)
    }

    fn reverse_entry(&self, owner: &Owner, id: Uuid, date: NaiveDate) -> Result<JournalEntry> {
        self.check()?;
        self.inner.reverse_entry(owner, id, date)
    }

    fn replace_draft_lines(
        &self,
        owner: &Owner,
        id: Uuid,
        lines: Vec<JournalLine>,
    ) -> Result<JournalEntry> {
        self.inner.replace_draft_lines(owner, id, lines)
    }

    fn post_entry(&self, owner: &Owner, id: Uuid) -> Result<JournalEntry> {
        self.inner.post_entry(owner, id)
    }

    fn record_invoice(&self, record: InvoiceRecord) -> Result<()> {
        self.inner.record_invoice(record)
    }

    fn invoice_history(&self, owner: &Owner) -> Result<Vec<InvoiceRecord>> {
        self.inner.invoice_history(owner)
    }

    fn enqueue_review(&self, item: ReviewItem) -> Result<ReviewItem> {
        self.inner.enqueue_review(item)
    }

    fn review(&self, owner: &Owner, id: Uuid) -> Result<ReviewItem> {
        self.inner.review(owner, id)
    }

    fn update_review(&self, item: &ReviewItem, expected: ReviewStatus) -> Result<()> {
        self.inner.update_review(item, expected)
    }

    fn open_reviews(&self, owner: &Owner) -> Result<Vec<ReviewItem>> {
        self.inner.open_reviews(owner)
    }
}
