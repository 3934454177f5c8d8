//! End-to-end document processing.
//!
//! A document flows through extraction, validation and scoring. Confident
//! financial documents are checked for duplicates and posted to the journal;
//! everything else lands in the review queue. Reviewer approvals re-enter
//! the flow at duplicate detection with the corrected fields.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::confidence::{ConfidenceReport, ConfidenceScorer};
use crate::duplicate::{DuplicateDetectionResult, DuplicateDetector, InvoiceRecord, Suggestion};
use crate::error::{JournalError, LedgrError, Result, ReviewError, StoreError};
use crate::extraction::ExtractionOrchestrator;
use crate::journal::{JournalGenerator, determine_kind};
use crate::models::config::LedgrConfig;
use crate::models::{
    ExtractionResult, FieldMap, IncomingDocument, InvoiceData, InvoiceKind, JournalEntry, Owner,
};
use crate::review::{ReviewItem, ReviewStatus};
use crate::store::{DocumentSource, LedgerStore, Notifier};
use crate::validation::{ValidationEngine, ValidationReport};

/// Where a document ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// A journal entry was posted.
    Posted { entry: JournalEntry },
    /// Waiting for a reviewer.
    QueuedForReview { item: ReviewItem },
    /// Waiting for a supervisor.
    Escalated { item: ReviewItem },
    /// Archived as a duplicate of an earlier invoice.
    ArchivedDuplicate { detection: DuplicateDetectionResult },
    /// Rejected by a reviewer and archived.
    Rejected { item: ReviewItem },
    /// Approved by a reviewer with nothing to post.
    Filed { item: ReviewItem },
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Posted { .. } => "posted",
            PipelineOutcome::QueuedForReview { .. } => "queued_for_review",
            PipelineOutcome::Escalated { .. } => "escalated",
            PipelineOutcome::ArchivedDuplicate { .. } => "archived_duplicate",
            PipelineOutcome::Rejected { .. } => "rejected",
            PipelineOutcome::Filed { .. } => "filed",
        }
    }
}

/// Duplicate decision and generated entry for one invoice.
struct Booking {
    kind: InvoiceKind,
    /// Absent for sales invoices.
    detection: Option<DuplicateDetectionResult>,
    entry: std::result::Result<JournalEntry, JournalError>,
}

/// What a reviewer approval will store.
enum Approval {
    /// Nothing to post.
    File,
    Archive(DuplicateDetectionResult),
    Post(InvoiceKind, JournalEntry),
}

fn match_reasons(detection: &DuplicateDetectionResult) -> String {
    detection
        .matches
        .first()
        .map(|m| m.match_reasons.join(", "))
        .unwrap_or_default()
}

/// Document-to-ledger pipeline over pluggable collaborators.
pub struct Pipeline {
    orchestrator: ExtractionOrchestrator,
    validator: ValidationEngine,
    scorer: ConfidenceScorer,
    detector: DuplicateDetector,
    generator: JournalGenerator,
    store: Arc<dyn LedgerStore>,
    source: Arc<dyn DocumentSource>,
    notifier: Arc<dyn Notifier>,
    client_gstins: HashMap<Uuid, String>,
    today: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(
        config: &LedgrConfig,
        store: Arc<dyn LedgerStore>,
        source: Arc<dyn DocumentSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orchestrator: ExtractionOrchestrator::from_config(&config.extraction),
            validator: ValidationEngine::new(config.validation.clone()),
            scorer: ConfidenceScorer::new(config.scoring.clone()),
            detector: DuplicateDetector::new(config.duplicates.clone()),
            generator: JournalGenerator::new(),
            store,
            source,
            notifier,
            client_gstins: HashMap::new(),
            today: None,
        }
    }

    /// Replace the provider chain built from configuration.
    pub fn with_orchestrator(mut self, orchestrator: ExtractionOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_generator(mut self, generator: JournalGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Register a client's own GSTIN so its invoices are booked as sales.
    pub fn with_client_gstin(mut self, client_id: Uuid, gstin: impl Into<String>) -> Self {
        self.client_gstins.insert(client_id, gstin.into());
        self
    }

    /// Pin the business date used by validation and reversals.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.validator = self.validator.with_today(today);
        self.today = Some(today);
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run a document through the pipeline.
    pub async fn process(&self, document: &IncomingDocument) -> Result<PipelineOutcome> {
        let owner = document.owner;
        self.store.save_document(document)?;

        let bytes = self.source.fetch(document).await?;
        let mut extraction = self.orchestrator.extract(document, &bytes).await;
        if let Some(previous) = self.store.latest_extraction(&owner, document.id)? {
            extraction.version = previous.version + 1;
        }
        self.store.save_extraction(&owner, &extraction)?;

        let invoice = InvoiceData::from_fields(&extraction.fields);
        let validation = if extraction.classification.doc_type.is_financial() {
            self.validator.validate(&invoice)
        } else {
            ValidationReport::from_outcomes(Vec::new())
        };
        let report = self.scorer.score(&extraction, &validation);

        if report.needs_review {
            let reason = report
                .review_reason
                .clone()
                .unwrap_or_else(|| "Manual review requested".to_string());
            return self.enqueue(owner, extraction, report, reason);
        }

        info!(
            "Document {} auto-approved with confidence {:.2}",
            document.id, report.weighted_score
        );
        self.finalize(owner, document.id, &invoice, extraction, report)
    }

    /// Duplicate check and journal entry for an invoice, worked out without
    /// writing anything. Sales invoices skip the duplicate check.
    fn book(&self, owner: Owner, document_id: Uuid, invoice: &InvoiceData) -> Result<Booking> {
        let client_gstin = self.client_gstins.get(&owner.client_id).map(String::as_str);
        let kind = determine_kind(invoice, client_gstin);
        let detection = match kind {
            InvoiceKind::Sales => None,
            InvoiceKind::Purchase => {
                let history = self.store.invoice_history(&owner)?;
                Some(self.detector.detect(invoice, &history))
            }
        };
        let entry = self.generator.generate(owner, Some(document_id), invoice, kind);
        Ok(Booking {
            kind,
            detection,
            entry,
        })
    }

    /// Route an automatically approved extraction: archive duplicates,
    /// queue anything doubtful, post the rest.
    fn finalize(
        &self,
        owner: Owner,
        document_id: Uuid,
        invoice: &InvoiceData,
        extraction: ExtractionResult,
        report: ConfidenceReport,
    ) -> Result<PipelineOutcome> {
        let booking = self.book(owner, document_id, invoice)?;

        if let Some(detection) = booking.detection {
            match detection.suggestion {
                Suggestion::Reject => {
                    return self.archive_duplicate(owner, document_id, detection);
                }
                Suggestion::Review => {
                    let reason = format!(
                        "Possible duplicate of an earlier invoice ({:.2}): {}",
                        detection.confidence,
                        match_reasons(&detection)
                    );
                    return self.enqueue(owner, extraction, report, reason);
                }
                Suggestion::Accept => {}
            }
        }

        match booking.entry {
            Ok(entry) => {
                let entry = self.post(owner, document_id, invoice, booking.kind, entry)?;
                Ok(PipelineOutcome::Posted { entry })
            }
            Err(JournalError::MissingAmount(field)) => {
                let reason = format!("Journal entry cannot be built without {}", field);
                self.enqueue(owner, extraction, report, reason)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn archive_duplicate(
        &self,
        owner: Owner,
        document_id: Uuid,
        detection: DuplicateDetectionResult,
    ) -> Result<PipelineOutcome> {
        let original = detection
            .matches
            .first()
            .map(|m| m.candidate_invoice_id.to_string())
            .unwrap_or_default();
        let reason = format!("Duplicate of invoice {}", original);
        self.store.archive_document(&owner, document_id, &reason)?;
        self.notifier.notify(
            "document.duplicate",
            json!({
                "document_id": document_id,
                "duplicate_of": original,
                "confidence": detection.confidence,
            }),
        );
        info!("Document {} archived: {}", document_id, reason);
        Ok(PipelineOutcome::ArchivedDuplicate { detection })
    }

    /// Persist the entry and its history record in one store write.
    fn post(
        &self,
        owner: Owner,
        document_id: Uuid,
        invoice: &InvoiceData,
        kind: InvoiceKind,
        entry: JournalEntry,
    ) -> Result<JournalEntry> {
        let record = InvoiceRecord::from_invoice(owner, Some(document_id), invoice, kind);
        let entry = self.store.create_entry_with_record(entry, record)?;

        self.notifier.notify(
            "journal.posted",
            json!({
                "entry_id": entry.id,
                "document_id": document_id,
                "status": entry.status.as_str(),
                "amount": entry.total_debit().to_string(),
            }),
        );
        info!(
            "Document {} booked as {} entry {}",
            document_id,
            kind.as_str(),
            entry.id
        );
        Ok(entry)
    }

    fn enqueue(
        &self,
        owner: Owner,
        extraction: ExtractionResult,
        report: ConfidenceReport,
        reason: String,
    ) -> Result<PipelineOutcome> {
        let candidate = ReviewItem::new(owner, extraction, report, reason);
        let candidate_id = candidate.id;
        let item = self.store.enqueue_review(candidate)?;
        let escalated = item.status == ReviewStatus::Escalated;

        if item.id == candidate_id {
            self.notifier.notify(
                if escalated { "review.escalated" } else { "review.queued" },
                json!({
                    "item_id": item.id,
                    "document_id": item.document_id,
                    "priority": item.priority.as_str(),
                    "reason": item.review_reason,
                }),
            );
            info!(
                "Document {} queued for review ({}, {} priority): {}",
                item.document_id,
                item.status,
                item.priority.as_str(),
                item.review_reason
            );
        }

        Ok(if escalated {
            PipelineOutcome::Escalated { item }
        } else {
            PipelineOutcome::QueuedForReview { item }
        })
    }

    /// Load an item, apply a transition and persist it if nobody changed
    /// the item in between.
    fn transition_review(
        &self,
        owner: &Owner,
        item_id: Uuid,
        apply: impl FnOnce(&mut ReviewItem) -> std::result::Result<(), ReviewError>,
    ) -> Result<ReviewItem> {
        let mut item = self.store.review(owner, item_id)?;
        let previous = item.status;
        apply(&mut item)?;
        self.store.update_review(&item, previous)?;
        Ok(item)
    }

    /// Claim an open item for a reviewer.
    pub fn claim_review(&self, owner: &Owner, item_id: Uuid, reviewer: &str) -> Result<ReviewItem> {
        self.transition_review(owner, item_id, |item| item.claim(reviewer))
            .map_err(|e| match e {
                LedgrError::Store(StoreError::Conflict(_)) => {
                    ReviewError::AlreadyClaimed(item_id.to_string()).into()
                }
                other => other,
            })
    }

    /// Approve a claimed item and restart the flow with the corrected fields.
    ///
    /// The outcome is worked out before anything is stored, so a correction
    /// that cannot be booked leaves the item with its reviewer. Should a
    /// write fail after the approval is saved, the item is handed back.
    pub fn approve_review(
        &self,
        owner: &Owner,
        item_id: Uuid,
        reviewer: &str,
        corrected: FieldMap,
    ) -> Result<PipelineOutcome> {
        let claimed = self.store.review(owner, item_id)?;
        let mut approved = claimed.clone();
        approved.approve(reviewer, corrected.clone())?;

        let latest = self
            .store
            .latest_extraction(owner, claimed.document_id)?
            .unwrap_or_else(|| claimed.extracted_data.clone());
        let next = latest.corrected(corrected);
        let invoice = InvoiceData::from_fields(&next.fields);

        let approval =
            if !next.classification.doc_type.is_financial() && invoice.grand_total.is_none() {
                Approval::File
            } else {
                let booking = self.book(*owner, claimed.document_id, &invoice)?;
                match booking.detection {
                    Some(detection) if detection.suggestion == Suggestion::Reject => {
                        Approval::Archive(detection)
                    }
                    detection => {
                        if let Some(d) = detection.filter(|d| d.suggestion == Suggestion::Review) {
                            warn!(
                                "Posting approved document {} despite possible duplicate: {}",
                                claimed.document_id,
                                match_reasons(&d)
                            );
                        }
                        Approval::Post(booking.kind, booking.entry?)
                    }
                }
            };

        self.store.update_review(&approved, claimed.status)?;
        let outcome = match self.commit_approval(owner, approved, next, &invoice, approval) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Approval of review item {} failed, handing it back: {}", item_id, e);
                if let Err(restore) = self.store.update_review(&claimed, ReviewStatus::Approved) {
                    warn!("Review item {} could not be handed back: {}", item_id, restore);
                }
                return Err(e);
            }
        };

        self.notifier.notify(
            "review.approved",
            json!({ "item_id": item_id, "document_id": claimed.document_id, "reviewer": reviewer }),
        );
        Ok(outcome)
    }

    fn commit_approval(
        &self,
        owner: &Owner,
        item: ReviewItem,
        next: ExtractionResult,
        invoice: &InvoiceData,
        approval: Approval,
    ) -> Result<PipelineOutcome> {
        self.store.save_extraction(owner, &next)?;
        match approval {
            Approval::File => {
                info!("Document {} verified and filed", item.document_id);
                Ok(PipelineOutcome::Filed { item })
            }
            Approval::Archive(detection) => {
                self.archive_duplicate(*owner, item.document_id, detection)
            }
            Approval::Post(kind, entry) => {
                let entry = self.post(*owner, item.document_id, invoice, kind, entry)?;
                Ok(PipelineOutcome::Posted { entry })
            }
        }
    }

    /// Reject a claimed item and archive its document.
    pub fn reject_review(
        &self,
        owner: &Owner,
        item_id: Uuid,
        reviewer: &str,
        reason: &str,
    ) -> Result<PipelineOutcome> {
        let item = self.transition_review(owner, item_id, |item| item.reject(reviewer, reason))?;
        let archive_reason = format!("Rejected by {}: {}", reviewer, reason);
        self.store.archive_document(owner, item.document_id, &archive_reason)?;
        self.notifier.notify(
            "review.rejected",
            json!({ "item_id": item.id, "document_id": item.document_id, "reason": reason }),
        );
        Ok(PipelineOutcome::Rejected { item })
    }

    /// Hand an open item to a supervisor.
    pub fn escalate_review(
        &self,
        owner: &Owner,
        item_id: Uuid,
        reason: &str,
    ) -> Result<ReviewItem> {
        let item = self.transition_review(owner, item_id, |item| item.escalate(reason))?;
        self.notifier.notify(
            "review.escalated",
            json!({
                "item_id": item.id,
                "document_id": item.document_id,
                "priority": item.priority.as_str(),
                "reason": reason,
            }),
        );
        Ok(item)
    }

    /// Open review items for a client, highest priority then oldest first.
    pub fn list_pending(&self, owner: &Owner) -> Result<Vec<ReviewItem>> {
        self.store.open_reviews(owner)
    }

    /// Reverse a posted entry as of the business date.
    pub fn reverse_entry(&self, owner: &Owner, entry_id: Uuid) -> Result<JournalEntry> {
        let reversal = self.store.reverse_entry(owner, entry_id, self.today())?;
        self.notifier.notify(
            "journal.reversed",
            json!({ "entry_id": entry_id, "reversal_id": reversal.id }),
        );
        Ok(reversal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::extraction::testing::{Script, ScriptedProvider};
    use crate::models::Channel;
    use crate::store::{MemoryNotifier, MemoryStore};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const CLEAN_INVOICE: &str = "TAX INVOICE
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

    fn setup(
        script: Script,
    ) -> (Pipeline, Arc<MemoryStore>, Arc<MemoryNotifier>, IncomingDocument) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let orchestrator = ExtractionOrchestrator::new(
            vec![ScriptedProvider::boxed("pdf_text", script)],
            Duration::from_secs(1),
        );
        let pipeline = Pipeline::new(
            &LedgrConfig::default(),
            store.clone(),
            store.clone(),
            notifier.clone(),
        )
        .with_orchestrator(orchestrator)
        .with_today(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

        let owner = Owner::new(Uuid::new_v4(), Uuid::new_v4());
        let doc = IncomingDocument::new(owner, Channel::Upload, "blob/1", "invoice.pdf");
        store.put_content("blob/1", b"%PDF-1.7".to_vec());
        (pipeline, store, notifier, doc)
    }

    #[tokio::test]
    async fn test_clean_invoice_is_posted() {
        let (pipeline, store, notifier, doc) = setup(Script::Text(CLEAN_INVOICE, 0.95));

        let outcome = pipeline.process(&doc).await.unwrap();
        let PipelineOutcome::Posted { entry } = outcome else {
            panic!("expected posting, got {:?}", outcome.label());
        };
        assert_eq!(entry.source_document, Some(doc.id));
        assert_eq!(store.invoice_history(&doc.owner).unwrap().len(), 1);
        assert_eq!(notifier.event_names(), vec!["journal.posted"]);
    }

    #[tokio::test]
    async fn test_failed_extraction_escalates() {
        let (pipeline, store, notifier, doc) =
            setup(Script::Fail(ProviderError::Request("quota exceeded".to_string())));

        let outcome = pipeline.process(&doc).await.unwrap();
        assert_eq!(outcome.label(), "escalated");
        assert_eq!(notifier.event_names(), vec!["review.escalated"]);
        assert!(store.entries(&doc.owner).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reprocessing_bumps_extraction_version() {
        let (pipeline, store, _, doc) = setup(Script::Text("scribbles", 0.4));

        pipeline.process(&doc).await.unwrap();
        pipeline.process(&doc).await.unwrap();
        let latest = store.latest_extraction(&doc.owner, doc.id).unwrap().unwrap();
        assert_eq!(latest.version, 2);
    }

    #[tokio::test]
    async fn test_concurrent_claim_maps_to_already_claimed() {
        let (pipeline, store, _, doc) = setup(Script::Text("scribbles", 0.6));
        let PipelineOutcome::QueuedForReview { item } = pipeline.process(&doc).await.unwrap() else {
            panic!("expected queued item");
        };

        // Simulate a reviewer who loaded the item before it was claimed.
        let stale = store.review(&doc.owner, item.id).unwrap();
        pipeline.claim_review(&doc.owner, item.id, "asha").unwrap();

        let mut racing = stale.clone();
        racing.claim("ravi").unwrap();
        let err = store.update_review(&racing, stale.status).unwrap_err();
        assert!(matches!(err, LedgrError::Store(StoreError::Conflict(_))));

        let err = pipeline.claim_review(&doc.owner, item.id, "ravi").unwrap_err();
        assert!(matches!(err, LedgrError::Review(ReviewError::AlreadyClaimed(_))));
    }
}
