//! The GST rule set.

use chrono::Duration;
use rust_decimal::Decimal;

use super::{Rule, RuleContext, RuleOutcome, Severity, format_inr};
use crate::document::rules::gstin::{gstin_issue, state_code_for, state_name};
use crate::models::invoice::keys;
use crate::models::{InvoiceData, SupplyType};

/// Two-digit state prefix of a GSTIN-like string, valid or not.
fn state_prefix(gstin: &str) -> Option<&str> {
    let prefix = gstin.get(..2)?;
    prefix.bytes().all(|b| b.is_ascii_digit()).then_some(prefix)
}

/// Vendor and buyer state codes. The buyer falls back to place of supply.
pub(crate) fn state_codes(invoice: &InvoiceData) -> Option<(String, String)> {
    let vendor = invoice.vendor_gstin.as_deref().and_then(state_prefix)?;
    let buyer = invoice
        .buyer_gstin
        .as_deref()
        .and_then(state_prefix)
        .map(str::to_string)
        .or_else(|| invoice.place_of_supply.as_deref().and_then(state_code_for))?;
    Some((vendor.to_string(), buyer))
}

fn is_nonzero(amount: Option<Decimal>) -> bool {
    amount.is_some_and(|a| !a.is_zero())
}

fn state_label(code: &str) -> String {
    match state_name(code) {
        Some(name) => format!("{} ({})", code, name),
        None => code.to_string(),
    }
}

/// Vendor and buyer GSTIN shape, state code and check character.
pub struct GstinChecksumRule;

impl Rule for GstinChecksumRule {
    fn name(&self) -> &'static str {
        "gstin_checksum"
    }

    fn check(&self, invoice: &InvoiceData, _ctx: &RuleContext<'_>) -> RuleOutcome {
        let mut problems = Vec::new();
        let mut implicated = Vec::new();
        let mut severity = Severity::Warning;
        let mut checked = Vec::new();

        match invoice.vendor_gstin.as_deref() {
            None => {
                problems.push("Vendor GSTIN not found".to_string());
                implicated.push(keys::VENDOR_GSTIN);
            }
            Some(gstin) => match gstin_issue(gstin) {
                Some(issue) => {
                    problems.push(format!("Vendor GSTIN {} is invalid: {}", gstin, issue));
                    implicated.push(keys::VENDOR_GSTIN);
                    severity = Severity::Critical;
                }
                None => checked.push(keys::VENDOR_GSTIN),
            },
        }

        if let Some(gstin) = invoice.buyer_gstin.as_deref() {
            match gstin_issue(gstin) {
                Some(issue) => {
                    problems.push(format!("Buyer GSTIN {} is invalid: {}", gstin, issue));
                    implicated.push(keys::BUYER_GSTIN);
                    severity = Severity::Critical;
                }
                None => checked.push(keys::BUYER_GSTIN),
            }
        }

        if !problems.is_empty() {
            return RuleOutcome::fail(self.name(), severity, problems.join("; "), &implicated);
        }

        let vendor = invoice.vendor_gstin.as_deref().unwrap_or_default();
        let state = state_prefix(vendor).map(state_label).unwrap_or_default();
        RuleOutcome::pass(
            self.name(),
            format!("GSTIN checksum valid, vendor state {}", state),
            &checked,
        )
    }
}

/// Same-state supplies carry CGST + SGST in equal halves and no IGST.
pub struct IntraStateRule;

impl Rule for IntraStateRule {
    fn name(&self) -> &'static str {
        "intra_state_tax"
    }

    fn check(&self, invoice: &InvoiceData, ctx: &RuleContext<'_>) -> RuleOutcome {
        let Some((vendor, buyer)) = state_codes(invoice) else {
            return RuleOutcome::not_applicable(
                self.name(),
                "State codes unavailable, intra-state split not checked",
            );
        };
        if vendor != buyer {
            return RuleOutcome::not_applicable(self.name(), "Inter-state supply");
        }

        if is_nonzero(invoice.igst) {
            return RuleOutcome::fail(
                self.name(),
                Severity::Critical,
                format!(
                    "IGST {} charged on a supply within state {}",
                    format_inr(invoice.igst.unwrap_or_default()),
                    state_label(&vendor)
                ),
                &[keys::IGST],
            );
        }

        let cgst = invoice.cgst.unwrap_or_default();
        let sgst = invoice.sgst.unwrap_or_default();
        if (cgst - sgst).abs() > ctx.config.split_tolerance {
            return RuleOutcome::fail(
                self.name(),
                Severity::Critical,
                format!(
                    "CGST {} and SGST {} should be equal",
                    format_inr(cgst),
                    format_inr(sgst)
                ),
                &[keys::CGST, keys::SGST],
            );
        }

        let components = [
            (keys::CGST, invoice.cgst),
            (keys::SGST, invoice.sgst),
            (keys::IGST, invoice.igst),
        ];
        let covered: Vec<&str> = components
            .into_iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k)
            .collect();
        RuleOutcome::pass(
            self.name(),
            format!("Intra-state split correct (CGST = SGST = {})", format_inr(cgst)),
            &covered,
        )
    }
}

/// Cross-state supplies carry IGST only.
pub struct InterStateRule;

impl Rule for InterStateRule {
    fn name(&self) -> &'static str {
        "inter_state_tax"
    }

    fn check(&self, invoice: &InvoiceData, _ctx: &RuleContext<'_>) -> RuleOutcome {
        let Some((vendor, buyer)) = state_codes(invoice) else {
            return RuleOutcome::not_applicable(
                self.name(),
                "State codes unavailable, inter-state split not checked",
            );
        };
        if vendor == buyer {
            return RuleOutcome::not_applicable(self.name(), "Intra-state supply");
        }

        if is_nonzero(invoice.cgst) || is_nonzero(invoice.sgst) {
            return RuleOutcome::fail(
                self.name(),
                Severity::Critical,
                format!(
                    "CGST/SGST charged on a supply from {} to {}",
                    state_label(&vendor),
                    state_label(&buyer)
                ),
                &[keys::CGST, keys::SGST],
            );
        }
        if !is_nonzero(invoice.igst) {
            return RuleOutcome::fail(
                self.name(),
                Severity::Critical,
                format!(
                    "IGST missing on a supply from {} to {}",
                    state_label(&vendor),
                    state_label(&buyer)
                ),
                &[keys::IGST],
            );
        }

        RuleOutcome::pass(
            self.name(),
            format!(
                "Inter-state IGST {} applied",
                format_inr(invoice.igst.unwrap_or_default())
            ),
            &[keys::IGST],
        )
    }
}

/// subtotal + taxes + round-off must equal the grand total.
pub struct TaxArithmeticRule;

impl Rule for TaxArithmeticRule {
    fn name(&self) -> &'static str {
        "tax_arithmetic"
    }

    fn check(&self, invoice: &InvoiceData, ctx: &RuleContext<'_>) -> RuleOutcome {
        let (Some(subtotal), Some(total)) = (invoice.subtotal, invoice.grand_total) else {
            let totals = [
                (keys::SUBTOTAL, invoice.subtotal),
                (keys::GRAND_TOTAL, invoice.grand_total),
            ];
            let missing: Vec<&str> = totals
                .into_iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| k)
                .collect();
            return RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                format!("Cannot verify totals, missing {}", missing.join(" and ")),
                &missing,
            );
        };

        let computed = subtotal + invoice.total_tax() + invoice.round_off.unwrap_or_default();
        let diff = (computed - total).abs();
        if diff > ctx.config.arithmetic_tolerance {
            return RuleOutcome::fail(
                self.name(),
                Severity::Critical,
                format!(
                    "Subtotal plus taxes is {} but grand total is {} (off by {})",
                    format_inr(computed),
                    format_inr(total),
                    format_inr(diff)
                ),
                &[keys::SUBTOTAL, keys::GRAND_TOTAL],
            );
        }

        let mut covered = vec![keys::SUBTOTAL, keys::GRAND_TOTAL];
        for (key, value) in [
            (keys::CGST, invoice.cgst),
            (keys::SGST, invoice.sgst),
            (keys::IGST, invoice.igst),
            (keys::CESS, invoice.cess),
            (keys::ROUND_OFF, invoice.round_off),
        ] {
            if value.is_some() {
                covered.push(key);
            }
        }
        RuleOutcome::pass(
            self.name(),
            format!("Totals add up to {}", format_inr(total)),
            &covered,
        )
    }
}

/// HSN/SAC codes are 4, 6 or 8 digits.
pub struct HsnCodeRule;

/// Whether an HSN/SAC code has an accepted length.
pub fn is_valid_hsn(code: &str) -> bool {
    matches!(code.len(), 4 | 6 | 8) && code.bytes().all(|b| b.is_ascii_digit())
}

impl Rule for HsnCodeRule {
    fn name(&self) -> &'static str {
        "hsn_code_format"
    }

    fn check(&self, invoice: &InvoiceData, _ctx: &RuleContext<'_>) -> RuleOutcome {
        if invoice.line_items.is_empty() {
            return RuleOutcome::not_applicable(self.name(), "No line items to check");
        }

        let mut problems = Vec::new();
        for (i, line) in invoice.line_items.iter().enumerate() {
            match line.hsn_code.as_deref().map(str::trim) {
                None | Some("") => problems.push(format!("line {} has no HSN/SAC code", i + 1)),
                Some(code) if !is_valid_hsn(code) => problems.push(format!(
                    "line {} code {} must be 4, 6 or 8 digits",
                    i + 1,
                    code
                )),
                Some(_) => {}
            }
        }

        if problems.is_empty() {
            RuleOutcome::pass(
                self.name(),
                format!("{} HSN/SAC codes well formed", invoice.line_items.len()),
                &[keys::LINE_ITEMS],
            )
        } else {
            RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                problems.join("; "),
                &[keys::LINE_ITEMS],
            )
        }
    }
}

/// Invoice date within the last year, due date within six months of it.
pub struct DateLogicRule;

impl Rule for DateLogicRule {
    fn name(&self) -> &'static str {
        "date_logic"
    }

    fn check(&self, invoice: &InvoiceData, ctx: &RuleContext<'_>) -> RuleOutcome {
        let Some(date) = invoice.invoice_date else {
            return RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                "Invoice date not found",
                &[keys::INVOICE_DATE],
            );
        };

        let config = ctx.config;
        if date > ctx.today {
            return RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                format!("Invoice date {} is in the future", date),
                &[keys::INVOICE_DATE],
            );
        }
        if date < ctx.today - Duration::days(config.max_invoice_age_days) {
            return RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                format!(
                    "Invoice date {} is more than {} days old",
                    date, config.max_invoice_age_days
                ),
                &[keys::INVOICE_DATE],
            );
        }

        if let Some(due) = invoice.due_date {
            if due < date {
                return RuleOutcome::fail(
                    self.name(),
                    Severity::Warning,
                    format!("Due date {} is before invoice date {}", due, date),
                    &[keys::DUE_DATE],
                );
            }
            if due > date + Duration::days(config.max_due_days) {
                return RuleOutcome::fail(
                    self.name(),
                    Severity::Warning,
                    format!(
                        "Due date {} is more than {} days after invoice date {}",
                        due, config.max_due_days, date
                    ),
                    &[keys::DUE_DATE],
                );
            }
            return RuleOutcome::pass(
                self.name(),
                format!("Invoice date {} and due date {} are plausible", date, due),
                &[keys::INVOICE_DATE, keys::DUE_DATE],
            );
        }

        RuleOutcome::pass(
            self.name(),
            format!("Invoice date {} is plausible", date),
            &[keys::INVOICE_DATE],
        )
    }
}

/// High-value invoices need a buyer GSTIN; a printed B2B/B2C tag must
/// agree with buyer GSTIN presence.
pub struct ThresholdRule;

impl Rule for ThresholdRule {
    fn name(&self) -> &'static str {
        "gstin_threshold"
    }

    fn check(&self, invoice: &InvoiceData, ctx: &RuleContext<'_>) -> RuleOutcome {
        let has_buyer = invoice.buyer_gstin.is_some();
        let threshold = ctx.config.buyer_gstin_threshold;

        if let Some(total) = invoice.grand_total {
            if total > threshold && !has_buyer {
                return RuleOutcome::fail(
                    self.name(),
                    Severity::Warning,
                    format!(
                        "Invoice total {} exceeds {} but has no buyer GSTIN",
                        format_inr(total),
                        format_inr(threshold)
                    ),
                    &[keys::BUYER_GSTIN],
                );
            }
        }

        match invoice.supply_type {
            Some(SupplyType::B2B) if !has_buyer => RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                "Marked B2B but no buyer GSTIN found",
                &[keys::BUYER_GSTIN, keys::SUPPLY_TYPE],
            ),
            Some(SupplyType::B2C) if has_buyer => RuleOutcome::fail(
                self.name(),
                Severity::Warning,
                "Marked B2C but a buyer GSTIN is present",
                &[keys::SUPPLY_TYPE],
            ),
            Some(supply) => RuleOutcome::pass(
                self.name(),
                format!("{} classification matches buyer registration", supply.as_str()),
                &[keys::SUPPLY_TYPE],
            ),
            None => RuleOutcome::pass(self.name(), "Buyer registration requirement met", &[]),
        }
    }
}
