//! Human review queue items and their state machine.
//!
//! ```text
//! pending ──claim──▶ in_review ──approve──▶ approved
//!    │                  │ ├─────reject───▶ rejected
//!    └────escalate──────┴─┴───escalate───▶ escalated
//!                       ▲                      │
//!                       └──supervisor claim────┘
//! ```
//!
//! Escalated items stay open until a supervisor claims them; they then
//! follow the same approve/reject path as any other claimed item.
//!
//! Transitions are pure; the store persists them with a compare-and-swap on
//! the previous status so two reviewers can never both claim an item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence::{ConfidenceReport, ReviewBand};
use crate::error::ReviewError;
use crate::models::{ExtractionResult, FieldMap, Owner};

/// Lifecycle state of a review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Escalated,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::InReview => "in_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Escalated => "escalated",
        }
    }

    /// No further transitions leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }

    pub fn can_transition_to(&self, next: ReviewStatus) -> bool {
        use ReviewStatus::*;
        matches!(
            (self, next),
            (Pending, InReview)
                | (Pending, Escalated)
                | (InReview, Approved)
                | (InReview, Rejected)
                | (InReview, Escalated)
                | (Escalated, InReview)
        )
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue priority, highest served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn for_report(report: &ConfidenceReport) -> Self {
        if report.escalate {
            Priority::High
        } else {
            match report.band {
                ReviewBand::ReviewRequired => Priority::Normal,
                ReviewBand::ReviewRecommended | ReviewBand::AutoApprove => Priority::Low,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// A document awaiting (or past) human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: Uuid,
    pub owner: Owner,
    pub document_id: Uuid,
    pub extracted_data: ExtractionResult,
    pub confidence_report: ConfidenceReport,
    pub status: ReviewStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_data: Option<FieldMap>,
    pub review_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_note: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewItem {
    /// New pending item. Reports flagged for escalation start escalated.
    pub fn new(
        owner: Owner,
        extraction: ExtractionResult,
        report: ConfidenceReport,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let status = if report.escalate {
            ReviewStatus::Escalated
        } else {
            ReviewStatus::Pending
        };
        Self {
            id: Uuid::new_v4(),
            owner,
            document_id: extraction.document_id,
            priority: Priority::for_report(&report),
            extracted_data: extraction,
            confidence_report: report,
            status,
            assigned_to: None,
            corrected_data: None,
            review_reason: reason.into(),
            decision_note: None,
            enqueued_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: ReviewStatus) -> Result<(), ReviewError> {
        if !self.status.can_transition_to(next) {
            return Err(ReviewError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn check_assignee(&self, reviewer: &str) -> Result<(), ReviewError> {
        match self.assigned_to.as_deref() {
            Some(assigned) if assigned == reviewer => Ok(()),
            assigned => Err(ReviewError::NotAssignee {
                item: self.id.to_string(),
                assigned: assigned.unwrap_or("nobody").to_string(),
                reviewer: reviewer.to_string(),
            }),
        }
    }

    /// Take a pending item, or an escalated one as supervisor.
    pub fn claim(&mut self, reviewer: &str) -> Result<(), ReviewError> {
        if self.status == ReviewStatus::InReview {
            return Err(ReviewError::AlreadyClaimed(self.id.to_string()));
        }
        self.transition(ReviewStatus::InReview)?;
        self.assigned_to = Some(reviewer.to_string());
        Ok(())
    }

    /// Approve with the reviewer's corrected fields.
    pub fn approve(&mut self, reviewer: &str, corrected: FieldMap) -> Result<(), ReviewError> {
        self.check_assignee(reviewer)?;
        self.transition(ReviewStatus::Approved)?;
        self.corrected_data = Some(corrected);
        Ok(())
    }

    pub fn reject(&mut self, reviewer: &str, reason: impl Into<String>) -> Result<(), ReviewError> {
        self.check_assignee(reviewer)?;
        self.transition(ReviewStatus::Rejected)?;
        self.decision_note = Some(reason.into());
        Ok(())
    }

    /// Hand the item to a supervisor. Allowed from pending or in review.
    pub fn escalate(&mut self, reason: impl Into<String>) -> Result<(), ReviewError> {
        self.transition(ReviewStatus::Escalated)?;
        self.priority = Priority::High;
        self.decision_note = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, DocumentType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn report(band: ReviewBand, escalate: bool) -> ConfidenceReport {
        ConfidenceReport {
            fields: Vec::new(),
            weighted_score: 0.7,
            should_auto_approve: false,
            needs_review: true,
            escalate,
            band,
            critical_issues: Vec::new(),
            warnings: Vec::new(),
            review_reason: None,
        }
    }

    fn item(band: ReviewBand, escalate: bool) -> ReviewItem {
        let extraction = ExtractionResult {
            document_id: Uuid::new_v4(),
            version: 1,
            classification: Classification::new(DocumentType::Invoice, 0.9),
            fields: FieldMap::new(),
            field_confidence: Default::default(),
            raw_text: String::new(),
            confidence: 0.7,
            provider: Some("pdf_text".to_string()),
            attempts: Vec::new(),
        };
        ReviewItem::new(
            Owner::new(Uuid::new_v4(), Uuid::new_v4()),
            extraction,
            report(band, escalate),
            "low confidence",
        )
    }

    #[test]
    fn test_priority_from_band() {
        assert_eq!(item(ReviewBand::ReviewRecommended, false).priority, Priority::Low);
        assert_eq!(item(ReviewBand::ReviewRequired, false).priority, Priority::Normal);

        let escalated = item(ReviewBand::ReviewRequired, true);
        assert_eq!(escalated.priority, Priority::High);
        assert_eq!(escalated.status, ReviewStatus::Escalated);
    }

    #[test]
    fn test_claim_then_approve() {
        let mut item = item(ReviewBand::ReviewRequired, false);
        item.claim("asha").unwrap();
        assert_eq!(item.status, ReviewStatus::InReview);
        assert_eq!(item.assigned_to.as_deref(), Some("asha"));

        let mut fields = FieldMap::new();
        fields.insert("grand_total".to_string(), json!("11800"));
        item.approve("asha", fields.clone()).unwrap();
        assert_eq!(item.status, ReviewStatus::Approved);
        assert_eq!(item.corrected_data, Some(fields));
    }

    #[test]
    fn test_second_claim_fails() {
        let mut item = item(ReviewBand::ReviewRequired, false);
        item.claim("asha").unwrap();
        assert_eq!(
            item.claim("ravi").unwrap_err(),
            ReviewError::AlreadyClaimed(item.id.to_string())
        );
        assert_eq!(item.assigned_to.as_deref(), Some("asha"));
    }

    #[test]
    fn test_only_assignee_decides() {
        let mut item = item(ReviewBand::ReviewRequired, false);
        item.claim("asha").unwrap();
        let err = item.reject("ravi", "wrong").unwrap_err();
        assert!(matches!(err, ReviewError::NotAssignee { .. }));
        assert_eq!(item.status, ReviewStatus::InReview);

        item.reject("asha", "not an invoice").unwrap();
        assert_eq!(item.status, ReviewStatus::Rejected);
        assert_eq!(item.decision_note.as_deref(), Some("not an invoice"));
    }

    #[test]
    fn test_approve_requires_claim() {
        let mut item = item(ReviewBand::ReviewRequired, false);
        assert!(matches!(
            item.approve("asha", FieldMap::new()),
            Err(ReviewError::NotAssignee { .. })
        ));
    }

    #[test]
    fn test_escalate_from_pending_and_in_review() {
        let mut pending = item(ReviewBand::ReviewRecommended, false);
        pending.escalate("needs CA sign-off").unwrap();
        assert_eq!(pending.status, ReviewStatus::Escalated);
        assert_eq!(pending.priority, Priority::High);

        let mut claimed = item(ReviewBand::ReviewRequired, false);
        claimed.claim("asha").unwrap();
        claimed.escalate("unclear GSTIN").unwrap();
        assert_eq!(claimed.status, ReviewStatus::Escalated);
    }

    #[test]
    fn test_supervisor_claims_escalated_item() {
        let mut item = item(ReviewBand::ReviewRequired, true);
        assert!(!item.status.is_terminal());

        item.claim("supervisor").unwrap();
        assert_eq!(item.status, ReviewStatus::InReview);
        assert_eq!(item.priority, Priority::High);

        item.approve("supervisor", FieldMap::new()).unwrap();
        assert_eq!(item.status, ReviewStatus::Approved);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut item = item(ReviewBand::ReviewRequired, false);
        item.claim("asha").unwrap();
        item.approve("asha", FieldMap::new()).unwrap();

        assert!(item.status.is_terminal());
        assert_eq!(
            item.escalate("late").unwrap_err(),
            ReviewError::InvalidTransition {
                from: "approved".to_string(),
                to: "escalated".to_string()
            }
        );
        assert!(item.claim("ravi").is_err());
    }

    #[test]
    fn test_transition_table() {
        use ReviewStatus::*;
        assert!(Pending.can_transition_to(InReview));
        assert!(!Pending.can_transition_to(Approved));
        assert!(!InReview.can_transition_to(Pending));
        assert!(Escalated.can_transition_to(InReview));
        assert!(!Escalated.can_transition_to(Approved));
    }
}
