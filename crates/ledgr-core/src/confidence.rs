//! Confidence scoring and the auto-approval gate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::config::ScoringConfig;
use crate::models::invoice::keys;
use crate::models::{ExtractionResult, InvoiceData};
use crate::validation::rules::state_codes;
use crate::validation::{Severity, ValidationReport, format_inr};

/// Confidence assigned to a field the extractor did not find.
pub const MISSING_CONFIDENCE: f32 = 0.5;
/// Confidence ceiling for a field a validation rule rejected.
pub const INVALID_CAP: f32 = 0.7;
/// Confidence of tax components derived from `total - subtotal`.
pub const INFERRED_TAX_CONFIDENCE: f32 = 0.6;

/// Validation status of one tracked field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Valid,
    Invalid,
    Unverified,
    Missing,
}

/// Score of one tracked field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub confidence: f32,
    pub status: FieldStatus,
    /// Highest severity among failed rules implicating the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub weight: f32,
}

/// Confidence band a document falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewBand {
    AutoApprove,
    ReviewRecommended,
    ReviewRequired,
}

/// Outcome of scoring one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub fields: Vec<FieldScore>,
    pub weighted_score: f32,
    pub should_auto_approve: bool,
    pub needs_review: bool,
    /// Very low confidence or very high value.
    pub escalate: bool,
    pub band: ReviewBand,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    /// Human-readable reason shown to reviewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

impl ConfidenceReport {
    pub fn field(&self, name: &str) -> Option<&FieldScore> {
        self.fields.iter().find(|f| f.field == name)
    }
}

/// Weighted confidence scorer.
pub struct ConfidenceScorer {
    config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score an extraction against its validation report.
    pub fn score(
        &self,
        extraction: &ExtractionResult,
        validation: &ValidationReport,
    ) -> ConfidenceReport {
        let financial = extraction.classification.doc_type.is_financial();
        let invoice = InvoiceData::from_fields(&extraction.fields);

        let fields = if financial {
            self.score_fields(extraction, &invoice, validation)
        } else {
            Vec::new()
        };

        let c = &self.config;
        let mut total = extraction.confidence * c.provider_weight
            + extraction.classification.confidence * c.classification_weight;
        let mut weights = c.provider_weight + c.classification_weight;
        for f in &fields {
            total += f.confidence * f.weight;
            weights += f.weight;
        }
        let weighted_score = if weights > 0.0 { total / weights } else { 0.0 };

        let critical_issues: Vec<String> = validation
            .critical_failures()
            .map(|o| o.message.clone())
            .collect();
        let mut warnings: Vec<String> = validation
            .failures()
            .filter(|o| o.severity == Severity::Warning)
            .map(|o| o.message.clone())
            .collect();
        if invoice.tax_components_inferred {
            warnings.push(
                "Tax components were inferred from the grand total and subtotal, not read from the document"
                    .to_string(),
            );
        }

        let critical_fields = fields
            .iter()
            .filter(|f| f.status == FieldStatus::Invalid && f.severity == Some(Severity::Critical))
            .count();
        let warning_fields = fields
            .iter()
            .filter(|f| f.status == FieldStatus::Invalid && f.severity == Some(Severity::Warning))
            .count();

        let mut reasons = Vec::new();
        if !financial {
            reasons.push(format!(
                "{} documents are filed for manual verification",
                extraction.classification.doc_type
            ));
        }
        if weighted_score < c.auto_approve_threshold {
            reasons.push(format!(
                "Confidence {:.2} is below the auto-approve threshold {:.2}",
                weighted_score, c.auto_approve_threshold
            ));
        }
        reasons.extend(critical_issues.iter().cloned());
        if warning_fields > c.max_warning_fields {
            reasons.push(format!(
                "{} fields failed warning-level checks",
                warning_fields
            ));
        }
        let high_value = invoice.grand_total.filter(|t| *t > c.high_value_amount);
        if let Some(total) = high_value {
            reasons.push(format!(
                "High-value invoice {} above {}",
                format_inr(total),
                format_inr(c.high_value_amount)
            ));
        }

        let needs_review = !financial
            || weighted_score < c.auto_approve_threshold
            || !critical_issues.is_empty()
            || critical_fields > 0
            || warning_fields > c.max_warning_fields
            || high_value.is_some();
        let should_auto_approve = !needs_review;

        let band = if !needs_review {
            ReviewBand::AutoApprove
        } else if weighted_score < c.needs_review_threshold
            || !critical_issues.is_empty()
            || warning_fields > c.max_warning_fields
        {
            ReviewBand::ReviewRequired
        } else {
            ReviewBand::ReviewRecommended
        };

        let escalate = needs_review
            && (weighted_score < c.escalation_confidence
                || invoice.grand_total.is_some_and(|t| t > c.escalation_amount));

        let review_reason = if needs_review {
            let mut all = reasons;
            for w in &warnings {
                if !all.contains(w) {
                    all.push(w.clone());
                }
            }
            Some(all.join("; "))
        } else {
            None
        };

        debug!(
            "Scored {} fields: weighted {:.3}, band {:?}, escalate {}",
            fields.len(),
            weighted_score,
            band,
            escalate
        );

        ConfidenceReport {
            fields,
            weighted_score,
            should_auto_approve,
            needs_review,
            escalate,
            band,
            critical_issues,
            warnings,
            review_reason,
        }
    }

    fn score_fields(
        &self,
        extraction: &ExtractionResult,
        invoice: &InvoiceData,
        validation: &ValidationReport,
    ) -> Vec<FieldScore> {
        let inapplicable = inapplicable_tax_fields(invoice);

        self.config
            .field_weights
            .iter()
            .filter(|(field, _)| {
                !(inapplicable.contains(&field.as_str()) && !invoice.has_field(field))
            })
            .map(|(field, weight)| {
                let value = extraction.fields.get(field).cloned();
                if !invoice.has_field(field) {
                    return FieldScore {
                        field: field.clone(),
                        value,
                        confidence: MISSING_CONFIDENCE,
                        status: FieldStatus::Missing,
                        severity: None,
                        weight: *weight,
                    };
                }

                let mut base = extraction
                    .field_confidence
                    .get(field)
                    .copied()
                    .unwrap_or(MISSING_CONFIDENCE);
                if invoice.tax_components_inferred && is_tax_component(field) {
                    base = base.min(INFERRED_TAX_CONFIDENCE);
                }

                let severity = validation
                    .failures()
                    .filter(|o| o.covers(field))
                    .map(|o| o.severity)
                    .max();
                let vouched = validation.outcomes.iter().any(|o| o.passed && o.covers(field));

                let (status, confidence) = match severity {
                    Some(_) => (FieldStatus::Invalid, base.min(INVALID_CAP)),
                    None if vouched => (FieldStatus::Valid, base),
                    None => (FieldStatus::Unverified, base),
                };

                FieldScore {
                    field: field.clone(),
                    value,
                    confidence,
                    status,
                    severity,
                    weight: *weight,
                }
            })
            .collect()
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

fn is_tax_component(field: &str) -> bool {
    matches!(field, keys::CGST | keys::SGST | keys::IGST)
}

/// Tax components that cannot appear given the supply's state codes.
fn inapplicable_tax_fields(invoice: &InvoiceData) -> Vec<&'static str> {
    match state_codes(invoice) {
        Some((vendor, buyer)) if vendor == buyer => vec![keys::IGST],
        Some(_) => vec![keys::CGST, keys::SGST],
        None => Vec::new(),
    }
}
