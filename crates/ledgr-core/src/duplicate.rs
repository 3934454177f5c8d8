//! Duplicate invoice detection against a client's purchase history.
//!
//! Only purchase invoices are compared: a client raising a second sales
//! invoice to the same buyer for the same amount is ordinary business.
//! Detection is a pure read-then-compare: the same candidate and history
//! always produce the same result, and nothing is locked or written.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::config::DuplicateConfig;
use crate::models::{InvoiceData, InvoiceKind, Owner};

/// Fixed score of a same-date, same-amount, same-vendor match.
pub const HEURISTIC_SCORE: f32 = 0.7;

const INVOICE_NUMBER_WEIGHT: f32 = 0.4;
const VENDOR_WEIGHT: f32 = 0.3;
const AMOUNT_WEIGHT: f32 = 0.3;

/// Legal-entity words dropped when comparing vendor names.
const ENTITY_SUFFIXES: &[&str] = &[
    "pvt",
    "private",
    "ltd",
    "limited",
    "inc",
    "incorporated",
    "llp",
    "llc",
    "co",
    "corp",
    "corporation",
    "company",
];

/// A previously recorded invoice in a client's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub owner: Owner,
    /// Document the invoice was extracted from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    pub invoice_number: String,
    pub vendor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_gstin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
    pub grand_total: Decimal,
    pub kind: InvoiceKind,
    pub recorded_at: DateTime<Utc>,
}

impl InvoiceRecord {
    /// Build a history record from a typed invoice. Requires a grand total.
    pub fn from_invoice(
        owner: Owner,
        document_id: Option<Uuid>,
        invoice: &InvoiceData,
        kind: InvoiceKind,
    ) -> Option<Self> {
        Some(Self {
            id: Uuid::new_v4(),
            owner,
            document_id,
            invoice_number: invoice.invoice_number.clone().unwrap_or_default(),
            vendor_name: invoice.vendor_name.clone().unwrap_or_default(),
            vendor_gstin: invoice.vendor_gstin.clone(),
            invoice_date: invoice.invoice_date,
            grand_total: invoice.grand_total?,
            kind,
            recorded_at: Utc::now(),
        })
    }
}

/// One history invoice resembling the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub candidate_invoice_id: Uuid,
    /// Similarity in [0, 1].
    pub similarity_score: f32,
    pub match_reasons: Vec<String>,
}

/// Routing decision for a candidate invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suggestion {
    Accept,
    Review,
    Reject,
}

/// Matches ranked by score plus the routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateDetectionResult {
    pub is_duplicate: bool,
    pub confidence: f32,
    pub matches: Vec<DuplicateMatch>,
    pub suggestion: Suggestion,
}

/// Exact, fuzzy and heuristic duplicate matching.
pub struct DuplicateDetector {
    config: DuplicateConfig,
}

impl DuplicateDetector {
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Compare a purchase candidate against the purchase records in
    /// `history`. Sales records are ignored.
    pub fn detect(
        &self,
        candidate: &InvoiceData,
        history: &[InvoiceRecord],
    ) -> DuplicateDetectionResult {
        let number =
            normalize_invoice_number(candidate.invoice_number.as_deref().unwrap_or_default());
        let vendor = normalize_vendor(candidate.vendor_name.as_deref().unwrap_or_default());

        let mut matches: Vec<DuplicateMatch> = history
            .iter()
            .filter(|record| record.kind == InvoiceKind::Purchase)
            .filter_map(|record| self.compare(candidate, &number, &vendor, record))
            .collect();

        matches.sort_by(|a, b| {
            b.similarity_score
                .total_cmp(&a.similarity_score)
                .then_with(|| a.candidate_invoice_id.cmp(&b.candidate_invoice_id))
        });

        let confidence = matches.first().map(|m| m.similarity_score).unwrap_or(0.0);
        let suggestion = if confidence >= self.config.reject_threshold {
            Suggestion::Reject
        } else if confidence >= self.config.review_threshold {
            Suggestion::Review
        } else {
            Suggestion::Accept
        };

        debug!(
            "Duplicate check against {} records: {} matches, confidence {:.2}",
            history.len(),
            matches.len(),
            confidence
        );

        DuplicateDetectionResult {
            is_duplicate: !matches.is_empty(),
            confidence,
            matches,
            suggestion,
        }
    }

    fn compare(
        &self,
        candidate: &InvoiceData,
        number: &str,
        vendor: &str,
        record: &InvoiceRecord,
    ) -> Option<DuplicateMatch> {
        let record_number = normalize_invoice_number(&record.invoice_number);
        let record_vendor = normalize_vendor(&record.vendor_name);

        let same_gstin = matches!(
            (candidate.vendor_gstin.as_deref(), record.vendor_gstin.as_deref()),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
        );
        let same_vendor = same_gstin || (!vendor.is_empty() && vendor == record_vendor);
        let same_number = !number.is_empty() && number == record_number;
        let amount_equal = candidate
            .grand_total
            .is_some_and(|t| (t - record.grand_total).abs() <= self.config.amount_tolerance);

        let mut score = 0.0f32;
        let mut reasons = Vec::new();

        if same_number && same_vendor && amount_equal {
            score = 1.0;
            reasons.push(format!(
                "Exact match: invoice number {}, vendor and amount",
                record.invoice_number
            ));
        } else {
            let number_similarity = similarity(number, &record_number);
            let vendor_similarity = if same_gstin {
                1.0
            } else {
                similarity(vendor, &record_vendor)
            };
            let amount_close = candidate
                .grand_total
                .is_some_and(|t| within_band(t, record.grand_total, self.config.fuzzy_amount_band));

            let fuzzy = INVOICE_NUMBER_WEIGHT * number_similarity
                + VENDOR_WEIGHT * vendor_similarity
                + if amount_close { AMOUNT_WEIGHT } else { 0.0 };
            if fuzzy > self.config.fuzzy_threshold {
                score = fuzzy;
                reasons.push(format!(
                    "Similar invoice {}: number {:.0}% alike, vendor {:.0}% alike{}",
                    record.invoice_number,
                    number_similarity * 100.0,
                    vendor_similarity * 100.0,
                    if amount_close { ", amount within 1%" } else { "" }
                ));
            }
        }

        let same_date =
            candidate.invoice_date.is_some() && candidate.invoice_date == record.invoice_date;
        if same_date && amount_equal && same_vendor && !same_number {
            score = score.max(HEURISTIC_SCORE);
            reasons.push(format!(
                "Same date, amount and vendor as invoice {} under a different number",
                record.invoice_number
            ));
        }

        (!reasons.is_empty()).then(|| DuplicateMatch {
            candidate_invoice_id: record.id,
            similarity_score: score,
            match_reasons: reasons,
        })
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DuplicateConfig::default())
    }
}

/// Lowercase and keep only letters and digits.
pub fn normalize_invoice_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lowercase, strip punctuation and drop legal-entity suffixes.
pub fn normalize_vendor(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();
    cleaned
        .split_whitespace()
        .filter(|word| !ENTITY_SUFFIXES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `1 - levenshtein / max_len`, zero when either side is empty.
fn similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) as f32
}

fn within_band(a: Decimal, b: Decimal, band: Decimal) -> bool {
    let reference = a.abs().max(b.abs());
    (a - b).abs() <= reference * band
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owner() -> Owner {
        Owner::new(Uuid::nil(), Uuid::nil())
    }

    fn record(number: &str, vendor: &str, total: i64, date: Option<NaiveDate>) -> InvoiceRecord {
        InvoiceRecord {
            id: Uuid::new_v4(),
            owner: owner(),
            document_id: None,
            invoice_number: number.to_string(),
            vendor_name: vendor.to_string(),
            vendor_gstin: None,
            invoice_date: date,
            grand_total: Decimal::from(total),
            kind: InvoiceKind::Purchase,
            recorded_at: Utc::now(),
        }
    }

    fn candidate(number: &str, vendor: &str, total: i64, date: Option<NaiveDate>) -> InvoiceData {
        InvoiceData {
            invoice_number: Some(number.to_string()),
            vendor_name: Some(vendor.to_string()),
            grand_total: Some(Decimal::from(total)),
            invoice_date: date,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_invoice_number("INV-001/24"), "inv00124");
        assert_eq!(normalize_vendor("ABC Pvt. Ltd."), "abc");
        assert_eq!(normalize_vendor("ABC Private Limited"), "abc");
        assert_eq!(normalize_vendor("Sharma & Sons Co"), "sharma sons");
    }

    #[test]
    fn test_exact_match_rejects() {
        let history = vec![record("INV/001", "Acme Pvt Ltd", 5000, None)];
        let candidate = candidate("inv-001", "ACME", 5000, None);
        let result = DuplicateDetector::default().detect(&candidate, &history);

        assert!(result.is_duplicate);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.suggestion, Suggestion::Reject);
        assert_eq!(result.matches[0].candidate_invoice_id, history[0].id);
    }

    #[test]
    fn test_fuzzy_match_reviews() {
        let history = vec![record("INV-001", "ABC Pvt Ltd", 5000, None)];
        let result = DuplicateDetector::default()
            .detect(&candidate("INV-01", "ABC Private Limited", 5000, None), &history);

        assert!(result.is_duplicate);
        assert!(result.confidence > 0.8);
        assert!((result.confidence - (0.4 * 5.0 / 6.0 + 0.6)).abs() < 1e-4);
        assert_eq!(result.suggestion, Suggestion::Review);
        assert!(result.matches[0].match_reasons[0].contains("amount within 1%"));
    }

    #[test]
    fn test_heuristic_match() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let history = vec![record("A-77", "Zen Foods", 1180, date)];
        let result = DuplicateDetector::default()
            .detect(&candidate("B-13", "Zen Foods Pvt Ltd", 1180, date), &history);

        assert_eq!(result.confidence, HEURISTIC_SCORE);
        assert_eq!(result.suggestion, Suggestion::Review);
        assert!(result.matches[0].match_reasons[0].contains("different number"));
    }

    #[test]
    fn test_unrelated_invoice_accepts() {
        let history = vec![record("INV-001", "ABC Pvt Ltd", 5000, None)];
        let result = DuplicateDetector::default()
            .detect(&candidate("X-9", "Other Traders", 120, None), &history);

        assert!(!result.is_duplicate);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.suggestion, Suggestion::Accept);
    }

    #[test]
    fn test_sales_history_is_ignored() {
        let mut sale = record("INV-2024-001", "Sharma Traders", 11_800, None);
        sale.kind = InvoiceKind::Sales;
        let result = DuplicateDetector::default()
            .detect(&candidate("INV-2024-001", "Sharma Traders", 11_800, None), &[sale]);

        assert!(!result.is_duplicate);
        assert_eq!(result.suggestion, Suggestion::Accept);
    }

    #[test]
    fn test_same_gstin_counts_as_same_vendor() {
        let mut rec = record("INV-500", "Globex Industries", 9000, None);
        rec.vendor_gstin = Some("29AAGCR4375J1ZU".to_string());
        let mut cand = candidate("INV-500", "GLOBEX IND.", 9000, None);
        cand.vendor_gstin = Some("29aagcr4375j1zu".to_string());

        let result = DuplicateDetector::default().detect(&cand, &[rec]);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_matches_sorted_and_idempotent() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let history = vec![
            record("Q-2", "Acme", 5000, date),
            record("INV-1", "Acme", 5000, date),
            record("INV-11", "Acme", 5000, None),
        ];
        let detector = DuplicateDetector::default();
        let cand = candidate("INV-1", "Acme Ltd", 5000, date);

        let first = detector.detect(&cand, &history);
        let scores: Vec<f32> = first.matches.iter().map(|m| m.similarity_score).collect();
        assert_eq!(first.matches.len(), 3);
        assert_eq!(scores[0], 1.0);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(detector.detect(&cand, &history), first);
    }
}
