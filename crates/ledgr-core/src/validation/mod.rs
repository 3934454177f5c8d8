//! Compliance validation for extracted invoices.
//!
//! The engine runs an ordered, pluggable rule set over the typed invoice
//! view. Failures are data, not errors: each outcome carries a severity and
//! a message a reviewer can read as-is.

pub mod rules;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::config::ValidationConfig;
use crate::models::{FieldMap, InvoiceData};

pub use rules::{
    DateLogicRule, GstinChecksumRule, HsnCodeRule, InterStateRule, IntraStateRule,
    TaxArithmeticRule, ThresholdRule,
};

/// How much a failed rule matters downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub passed: bool,
    pub message: String,
    pub severity: Severity,
    /// Field keys the outcome vouches for (passed) or implicates (failed).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl RuleOutcome {
    pub fn pass(rule: &str, message: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            rule_name: rule.to_string(),
            passed: true,
            message: message.into(),
            severity: Severity::Info,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Passed because the rule does not apply to this invoice.
    pub fn not_applicable(rule: &str, message: impl Into<String>) -> Self {
        Self::pass(rule, message, &[])
    }

    pub fn fail(
        rule: &str,
        severity: Severity,
        message: impl Into<String>,
        fields: &[&str],
    ) -> Self {
        Self {
            rule_name: rule.to_string(),
            passed: false,
            message: message.into(),
            severity,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn covers(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Inputs shared by every rule.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub today: NaiveDate,
    pub config: &'a ValidationConfig,
}

/// A single independent validation rule.
pub trait Rule: Send + Sync {
    /// Stable rule name shown in reports.
    fn name(&self) -> &'static str;

    /// Check the invoice.
    fn check(&self, invoice: &InvoiceData, ctx: &RuleContext<'_>) -> RuleOutcome;
}

/// Ordered rule outcomes plus the aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcomes: Vec<RuleOutcome>,
    /// Passed rules over total rules.
    pub overall_score: f32,
    /// False iff any critical rule failed.
    pub is_valid: bool,
}

impl ValidationReport {
    pub fn from_outcomes(outcomes: Vec<RuleOutcome>) -> Self {
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let overall_score = if outcomes.is_empty() {
            1.0
        } else {
            passed as f32 / outcomes.len() as f32
        };
        let is_valid = !outcomes
            .iter()
            .any(|o| !o.passed && o.severity == Severity::Critical);

        Self {
            outcomes,
            overall_score,
            is_valid,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn critical_failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.failures().filter(|o| o.severity == Severity::Critical)
    }

    pub fn outcome(&self, rule: &str) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule_name == rule)
    }
}

/// Runs the rule set in order.
pub struct ValidationEngine {
    rules: Vec<Box<dyn Rule>>,
    config: ValidationConfig,
    today: Option<NaiveDate>,
}

impl ValidationEngine {
    /// Engine with the seven GST rules.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            rules: default_rules(),
            config,
            today: None,
        }
    }

    /// Engine with no rules, for custom rule sets.
    pub fn empty(config: ValidationConfig) -> Self {
        Self {
            rules: Vec::new(),
            config,
            today: None,
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Pin the reference date used by date rules.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate a typed invoice.
    pub fn validate(&self, invoice: &InvoiceData) -> ValidationReport {
        let ctx = RuleContext {
            today: self.today.unwrap_or_else(|| Local::now().date_naive()),
            config: &self.config,
        };

        let outcomes: Vec<RuleOutcome> = self
            .rules
            .iter()
            .map(|rule| {
                let outcome = rule.check(invoice, &ctx);
                debug!(
                    "{}: {} ({})",
                    outcome.rule_name,
                    if outcome.passed { "pass" } else { "fail" },
                    outcome.message
                );
                outcome
            })
            .collect();

        let report = ValidationReport::from_outcomes(outcomes);
        info!(
            "Validation: {}/{} rules passed, valid = {}",
            report.passed_count(),
            report.outcomes.len(),
            report.is_valid
        );
        report
    }

    /// Validate a raw field map.
    pub fn validate_fields(&self, fields: &FieldMap) -> ValidationReport {
        self.validate(&InvoiceData::from_fields(fields))
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(GstinChecksumRule),
        Box::new(IntraStateRule),
        Box::new(InterStateRule),
        Box::new(TaxArithmeticRule),
        Box::new(HsnCodeRule),
        Box::new(DateLogicRule),
        Box::new(ThresholdRule),
    ]
}

/// Format an amount with Indian digit grouping, e.g. `₹1,23,456.78`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = rounded.abs().to_string();
    let (int_part, frac) = match plain.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (plain.as_str(), None),
    };

    let grouped = if int_part.len() <= 3 {
        int_part.to_string()
    } else {
        let (head, tail) = int_part.split_at(int_part.len() - 3);
        let mut groups = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    match frac {
        Some(f) => format!("{}₹{}.{}", sign, grouped, f),
        None => format!("{}₹{}", sign, grouped),
    }
}
