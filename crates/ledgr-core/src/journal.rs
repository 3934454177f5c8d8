//! Double-entry journal generation, posting, reversal and draft edits.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::JournalError;
use crate::models::{
    EntryStatus, EntryType, InvoiceData, InvoiceKind, JournalEntry, JournalLine, Owner,
};

/// Ledger account names used by generated entries.
pub mod accounts {
    pub const ACCOUNTS_RECEIVABLE: &str = "Accounts Receivable";
    pub const SALES: &str = "Sales";
    pub const OUTPUT_CGST: &str = "Output CGST";
    pub const OUTPUT_SGST: &str = "Output SGST";
    pub const OUTPUT_IGST: &str = "Output IGST";
    pub const OUTPUT_CESS: &str = "Output Cess";
    pub const PURCHASES: &str = "Purchases";
    pub const INPUT_CGST: &str = "Input CGST";
    pub const INPUT_SGST: &str = "Input SGST";
    pub const INPUT_IGST: &str = "Input IGST";
    pub const INPUT_CESS: &str = "Input Cess";
    pub const ACCOUNTS_PAYABLE: &str = "Accounts Payable";
    pub const ROUND_OFF: &str = "Round Off";
}

/// Largest unexplained difference booked to Round Off when the invoice
/// prints no round-off line.
pub const IMPLICIT_ROUND_OFF_LIMIT: Decimal = Decimal::ONE;

/// Decide whether an invoice is a sale or a purchase for the client.
///
/// The client's own GSTIN on the vendor side means a sale, on the buyer
/// side a purchase. Otherwise the printed hint is used, then purchase.
pub fn determine_kind(invoice: &InvoiceData, client_gstin: Option<&str>) -> InvoiceKind {
    if let Some(client) = client_gstin {
        let is = |g: &Option<String>| g.as_deref().is_some_and(|g| g.eq_ignore_ascii_case(client));
        if is(&invoice.vendor_gstin) {
            return InvoiceKind::Sales;
        }
        if is(&invoice.buyer_gstin) {
            return InvoiceKind::Purchase;
        }
    }
    invoice.invoice_kind.unwrap_or(InvoiceKind::Purchase)
}

/// Builds balanced entries from approved invoices.
pub struct JournalGenerator {
    auto_post: bool,
}

impl JournalGenerator {
    pub fn new() -> Self {
        Self { auto_post: true }
    }

    /// Leave generated entries in draft instead of posting them.
    pub fn with_auto_post(mut self, auto_post: bool) -> Self {
        self.auto_post = auto_post;
        self
    }

    /// Generate the entry for an invoice. Fails without building anything
    /// when an amount is missing or the lines do not balance.
    pub fn generate(
        &self,
        owner: Owner,
        source_document: Option<Uuid>,
        invoice: &InvoiceData,
        kind: InvoiceKind,
    ) -> Result<JournalEntry, JournalError> {
        let total = invoice
            .grand_total
            .ok_or_else(|| JournalError::MissingAmount("grand_total".to_string()))?;
        // Receipts often print only the total; the taxable value is what remains.
        let subtotal = invoice.subtotal.unwrap_or_else(|| {
            total - invoice.total_tax() - invoice.round_off.unwrap_or_default()
        });

        let taxes = [invoice.cgst, invoice.sgst, invoice.igst, invoice.cess];
        let round_off = invoice.round_off.unwrap_or_else(|| {
            let diff = total - subtotal - invoice.total_tax();
            if diff.abs() <= IMPLICIT_ROUND_OFF_LIMIT {
                diff
            } else {
                Decimal::ZERO
            }
        });

        let lines = match kind {
            InvoiceKind::Sales => sales_lines(total, subtotal, taxes, round_off),
            InvoiceKind::Purchase => purchase_lines(total, subtotal, taxes, round_off),
        };
        if lines.is_empty() {
            return Err(JournalError::MissingAmount("grand_total".to_string()));
        }

        let number = invoice.invoice_number.as_deref().unwrap_or("(no number)");
        let narration = match kind {
            InvoiceKind::Sales => match invoice.buyer_name.as_deref() {
                Some(buyer) => format!("Sales invoice {} to {}", number, buyer),
                None => format!("Sales invoice {}", number),
            },
            InvoiceKind::Purchase => match invoice.vendor_name.as_deref() {
                Some(vendor) => format!("Purchase invoice {} from {}", number, vendor),
                None => format!("Purchase invoice {}", number),
            },
        };

        let mut entry = JournalEntry {
            id: Uuid::new_v4(),
            owner,
            date: invoice
                .invoice_date
                .unwrap_or_else(|| Local::now().date_naive()),
            entry_type: match kind {
                InvoiceKind::Sales => EntryType::Sales,
                InvoiceKind::Purchase => EntryType::Purchase,
            },
            narration,
            is_auto_generated: true,
            status: EntryStatus::Draft,
            source_document,
            reverses: None,
            lines,
        };

        entry.check_balance()?;
        if self.auto_post {
            entry.status = EntryStatus::Posted;
        }

        debug!(
            "Generated {} entry {} with {} lines, total {}",
            kind.as_str(),
            entry.id,
            entry.lines.len(),
            entry.total_debit()
        );
        Ok(entry)
    }
}

impl Default for JournalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn push_debit(lines: &mut Vec<JournalLine>, account: &str, amount: Decimal) {
    if !amount.is_zero() {
        lines.push(JournalLine::debit(account, amount));
    }
}

fn push_credit(lines: &mut Vec<JournalLine>, account: &str, amount: Decimal) {
    if !amount.is_zero() {
        lines.push(JournalLine::credit(account, amount));
    }
}

fn sales_lines(
    total: Decimal,
    subtotal: Decimal,
    taxes: [Option<Decimal>; 4],
    round_off: Decimal,
) -> Vec<JournalLine> {
    use accounts::*;

    let mut lines = Vec::new();
    push_debit(&mut lines, ACCOUNTS_RECEIVABLE, total);
    push_credit(&mut lines, SALES, subtotal);
    let tax_accounts = [OUTPUT_CGST, OUTPUT_SGST, OUTPUT_IGST, OUTPUT_CESS];
    for (account, amount) in tax_accounts.into_iter().zip(taxes) {
        push_credit(&mut lines, account, amount.unwrap_or_default());
    }
    if round_off.is_sign_positive() {
        push_credit(&mut lines, ROUND_OFF, round_off);
    } else {
        push_debit(&mut lines, ROUND_OFF, round_off.abs());
    }
    lines
}

fn purchase_lines(
    total: Decimal,
    subtotal: Decimal,
    taxes: [Option<Decimal>; 4],
    round_off: Decimal,
) -> Vec<JournalLine> {
    use accounts::*;

    let mut lines = Vec::new();
    push_debit(&mut lines, PURCHASES, subtotal);
    let tax_accounts = [INPUT_CGST, INPUT_SGST, INPUT_IGST, INPUT_CESS];
    for (account, amount) in tax_accounts.into_iter().zip(taxes) {
        push_debit(&mut lines, account, amount.unwrap_or_default());
    }
    if round_off.is_sign_positive() {
        push_debit(&mut lines, ROUND_OFF, round_off);
    } else {
        push_credit(&mut lines, ROUND_OFF, round_off.abs());
    }
    push_credit(&mut lines, ACCOUNTS_PAYABLE, total);
    lines
}

/// Move a balanced draft to posted.
pub fn post_entry(entry: &mut JournalEntry) -> Result<(), JournalError> {
    if entry.status != EntryStatus::Draft {
        return Err(invalid_status(entry, "post"));
    }
    entry.check_balance()?;
    entry.status = EntryStatus::Posted;
    info!("Posted journal entry {}", entry.id);
    Ok(())
}

/// Build the entry that reverses a posted entry. The caller marks the
/// original reversed in the same unit of work.
pub fn reversal_of(entry: &JournalEntry, date: NaiveDate) -> Result<JournalEntry, JournalError> {
    if entry.status != EntryStatus::Posted {
        return Err(invalid_status(entry, "reverse"));
    }

    let reversal = JournalEntry {
        id: Uuid::new_v4(),
        owner: entry.owner,
        date,
        entry_type: EntryType::Reversal,
        narration: format!("Reversal of entry {}: {}", entry.id, entry.narration),
        is_auto_generated: entry.is_auto_generated,
        status: EntryStatus::Posted,
        source_document: entry.source_document,
        reverses: Some(entry.id),
        lines: entry.lines.iter().map(JournalLine::swapped).collect(),
    };
    reversal.check_balance()?;
    Ok(reversal)
}

/// Replace every line of a draft entry. Nothing changes unless the new
/// lines balance.
pub fn replace_draft_lines(
    entry: &mut JournalEntry,
    lines: Vec<JournalLine>,
) -> Result<(), JournalError> {
    if entry.status != EntryStatus::Draft {
        return Err(invalid_status(entry, "replace lines of"));
    }

    let candidate = JournalEntry {
        lines,
        ..entry.clone()
    };
    candidate.check_balance()?;
    entry.lines = candidate.lines;
    Ok(())
}

fn invalid_status(entry: &JournalEntry, action: &'static str) -> JournalError {
    JournalError::InvalidStatus {
        id: entry.id.to_string(),
        status: entry.status.as_str().to_string(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::accounts::*;
    use super::*;
    use pretty_assertions::assert_eq;

    fn owner() -> Owner {
        Owner::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn invoice() -> InvoiceData {
        InvoiceData {
            invoice_number: Some("INV-2024-001".to_string()),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            vendor_name: Some("Umbrella Traders".to_string()),
            buyer_name: Some("Pune Foods".to_string()),
            vendor_gstin: Some("27AABCU9603R1ZN".to_string()),
            buyer_gstin: Some("27AAPFU0939F1ZV".to_string()),
            subtotal: Some(Decimal::from(10_000)),
            cgst: Some(Decimal::from(900)),
            sgst: Some(Decimal::from(900)),
            igst: Some(Decimal::ZERO),
            grand_total: Some(Decimal::from(11_800)),
            ..Default::default()
        }
    }

    fn accounts_of(entry: &JournalEntry) -> Vec<(&str, Decimal, Decimal)> {
        entry
            .lines
            .iter()
            .map(|l| (l.account_name.as_str(), l.debit_amount, l.credit_amount))
            .collect()
    }

    #[test]
    fn test_sales_entry() {
        let entry = JournalGenerator::new()
            .generate(owner(), None, &invoice(), InvoiceKind::Sales)
            .unwrap();

        let zero = Decimal::ZERO;
        assert_eq!(
            accounts_of(&entry),
            vec![
                (ACCOUNTS_RECEIVABLE, Decimal::from(11_800), zero),
                (SALES, zero, Decimal::from(10_000)),
                (OUTPUT_CGST, zero, Decimal::from(900)),
                (OUTPUT_SGST, zero, Decimal::from(900)),
            ]
        );
        assert_eq!(entry.status, EntryStatus::Posted);
        assert_eq!(entry.entry_type, EntryType::Sales);
        assert_eq!(entry.narration, "Sales invoice INV-2024-001 to Pune Foods");
        assert!(entry.is_balanced());
    }

    #[test]
    fn test_purchase_entry_with_cess_and_round_off() {
        let mut inv = invoice();
        inv.cgst = None;
        inv.sgst = None;
        inv.igst = Some(Decimal::from(1_800));
        inv.cess = Some(Decimal::from(100));
        inv.round_off = Some(Decimal::new(-40, 2));
        inv.grand_total = Some(Decimal::new(1_189_960, 2));

        let entry = JournalGenerator::new()
            .generate(owner(), None, &inv, InvoiceKind::Purchase)
            .unwrap();

        let zero = Decimal::ZERO;
        assert_eq!(
            accounts_of(&entry),
            vec![
                (PURCHASES, Decimal::from(10_000), zero),
                (INPUT_IGST, Decimal::from(1_800), zero),
                (INPUT_CESS, Decimal::from(100), zero),
                (ROUND_OFF, zero, Decimal::new(40, 2)),
                (ACCOUNTS_PAYABLE, zero, Decimal::new(1_189_960, 2)),
            ]
        );
        assert!(entry.is_balanced());
    }

    #[test]
    fn test_implicit_round_off() {
        let mut inv = invoice();
        inv.grand_total = Some(Decimal::new(1_180_030, 2));
        let entry = JournalGenerator::new()
            .generate(owner(), None, &inv, InvoiceKind::Sales)
            .unwrap();
        let round = entry.lines.iter().find(|l| l.account_name == ROUND_OFF).unwrap();
        assert_eq!(round.credit_amount, Decimal::new(30, 2));
        assert!(entry.is_balanced());
    }

    #[test]
    fn test_unbalanced_invoice_fails() {
        let mut inv = invoice();
        inv.grand_total = Some(Decimal::from(12_500));
        let err = JournalGenerator::new()
            .generate(owner(), None, &inv, InvoiceKind::Purchase)
            .unwrap_err();
        assert!(matches!(err, JournalError::Unbalanced { .. }));
    }

    #[test]
    fn test_missing_total() {
        let mut inv = invoice();
        inv.grand_total = None;
        assert_eq!(
            JournalGenerator::new()
                .generate(owner(), None, &inv, InvoiceKind::Sales)
                .unwrap_err(),
            JournalError::MissingAmount("grand_total".to_string())
        );
    }

    #[test]
    fn test_zero_total_builds_nothing() {
        let inv = InvoiceData {
            invoice_number: Some("R-0".to_string()),
            grand_total: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert_eq!(
            JournalGenerator::new()
                .generate(owner(), None, &inv, InvoiceKind::Purchase)
                .unwrap_err(),
            JournalError::MissingAmount("grand_total".to_string())
        );
    }

    #[test]
    fn test_subtotal_derived_from_total() {
        let inv = InvoiceData {
            invoice_number: Some("R-1".to_string()),
            grand_total: Some(Decimal::from(450)),
            ..Default::default()
        };
        let entry = JournalGenerator::new()
            .generate(owner(), None, &inv, InvoiceKind::Purchase)
            .unwrap();
        assert_eq!(entry.lines[0].debit_amount, Decimal::from(450));
        assert_eq!(entry.narration, "Purchase invoice R-1");
    }

    #[test]
    fn test_reversal_swaps_lines() {
        let entry = JournalGenerator::new()
            .generate(owner(), None, &invoice(), InvoiceKind::Sales)
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let reversal = reversal_of(&entry, date).unwrap();

        assert_eq!(reversal.reverses, Some(entry.id));
        assert_eq!(reversal.entry_type, EntryType::Reversal);
        assert_eq!(reversal.lines[0].credit_amount, Decimal::from(11_800));
        assert_eq!(reversal.total_debit(), entry.total_credit());
        assert!(reversal.is_balanced());
        assert!(reversal.narration.contains(&entry.id.to_string()));
    }

    #[test]
    fn test_reversal_requires_posted() {
        let entry = JournalGenerator::new()
            .with_auto_post(false)
            .generate(owner(), None, &invoice(), InvoiceKind::Sales)
            .unwrap();
        let err = reversal_of(&entry, NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()).unwrap_err();
        assert!(matches!(err, JournalError::InvalidStatus { action: "reverse", .. }));
    }

    #[test]
    fn test_draft_line_replacement() {
        let mut entry = JournalGenerator::new()
            .with_auto_post(false)
            .generate(owner(), None, &invoice(), InvoiceKind::Purchase)
            .unwrap();

        let unbalanced = vec![
            JournalLine::debit(PURCHASES, Decimal::from(100)),
            JournalLine::credit(ACCOUNTS_PAYABLE, Decimal::from(90)),
        ];
        assert!(replace_draft_lines(&mut entry, unbalanced).is_err());
        assert_eq!(entry.lines.len(), 4);

        let balanced = vec![
            JournalLine::debit(PURCHASES, Decimal::from(100)),
            JournalLine::credit(ACCOUNTS_PAYABLE, Decimal::from(100)),
        ];
        replace_draft_lines(&mut entry, balanced).unwrap();
        assert_eq!(entry.lines.len(), 2);

        post_entry(&mut entry).unwrap();
        assert!(replace_draft_lines(&mut entry, Vec::new()).is_err());
    }

    #[test]
    fn test_determine_kind() {
        let inv = invoice();
        assert_eq!(determine_kind(&inv, Some("27aabcu9603r1zn")), InvoiceKind::Sales);
        assert_eq!(determine_kind(&inv, Some("27AAPFU0939F1ZV")), InvoiceKind::Purchase);

        let mut hinted = inv.clone();
        hinted.invoice_kind = Some(InvoiceKind::Sales);
        assert_eq!(determine_kind(&hinted, None), InvoiceKind::Sales);
        assert_eq!(determine_kind(&inv, None), InvoiceKind::Purchase);
    }
}
