//! Double-entry journal records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Owner;
use crate::error::JournalError;

/// Maximum allowed difference between total debits and credits.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Journal entry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Reversed => "reversed",
        }
    }
}

/// Business origin of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Sales,
    Purchase,
    Reversal,
    Manual,
}

/// One debit or credit line. Exactly one side is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_name: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
}

impl JournalLine {
    pub fn debit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_name: account.into(),
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
        }
    }

    pub fn credit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_name: account.into(),
            debit_amount: Decimal::ZERO,
            credit_amount: amount,
        }
    }

    /// The same line with debit and credit columns swapped.
    pub fn swapped(&self) -> Self {
        Self {
            account_name: self.account_name.clone(),
            debit_amount: self.credit_amount,
            credit_amount: self.debit_amount,
        }
    }
}

/// A journal entry and its ordered lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub owner: Owner,
    pub date: NaiveDate,
    pub entry_type: EntryType,
    pub narration: String,
    pub is_auto_generated: bool,
    pub status: EntryStatus,
    /// Document the entry was generated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_document: Option<Uuid>,
    /// Entry this one reverses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses: Option<Uuid>,
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit_amount).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit_amount).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.check_balance().is_ok()
    }

    /// Check line shape and the debit = credit invariant.
    pub fn check_balance(&self) -> Result<(), JournalError> {
        for line in &self.lines {
            let debit = line.debit_amount;
            let credit = line.credit_amount;
            if debit.is_sign_negative() || credit.is_sign_negative() {
                return Err(JournalError::MalformedLine(line.account_name.clone()));
            }
            if debit.is_zero() == credit.is_zero() {
                return Err(JournalError::MalformedLine(line.account_name.clone()));
            }
        }

        let debit = self.total_debit();
        let credit = self.total_credit();
        if (debit - credit).abs() > BALANCE_TOLERANCE {
            return Err(JournalError::Unbalanced { debit, credit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry {
            id: Uuid::new_v4(),
            owner: Owner::new(Uuid::new_v4(), Uuid::new_v4()),
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            entry_type: EntryType::Manual,
            narration: "test".to_string(),
            is_auto_generated: false,
            status: EntryStatus::Draft,
            source_document: None,
            reverses: None,
            lines,
        }
    }

    #[test]
    fn test_tolerance_is_one_paisa() {
        assert_eq!(BALANCE_TOLERANCE, Decimal::new(1, 2));
    }

    #[test]
    fn test_balanced_entry() {
        let e = entry(vec![
            JournalLine::debit("Accounts Receivable", Decimal::from(118)),
            JournalLine::credit("Sales", Decimal::from(100)),
            JournalLine::credit("Output IGST", Decimal::from(18)),
        ]);
        assert!(e.is_balanced());
    }

    #[test]
    fn test_unbalanced_entry() {
        let e = entry(vec![
            JournalLine::debit("Accounts Receivable", Decimal::from(118)),
            JournalLine::credit("Sales", Decimal::from(100)),
        ]);
        assert!(matches!(
            e.check_balance(),
            Err(JournalError::Unbalanced { .. })
        ));
    }

    #[test]
    fn test_within_tolerance() {
        let e = entry(vec![
            JournalLine::debit("Purchases", Decimal::new(10001, 2)),
            JournalLine::credit("Accounts Payable", Decimal::from(100)),
        ]);
        assert!(e.is_balanced());
    }

    #[test]
    fn test_line_with_both_sides_is_malformed() {
        let mut line = JournalLine::debit("Cash", Decimal::from(5));
        line.credit_amount = Decimal::from(5);
        let e = entry(vec![line]);
        assert_eq!(
            e.check_balance(),
            Err(JournalError::MalformedLine("Cash".to_string()))
        );
    }

    #[test]
    fn test_swapped_line() {
        let line = JournalLine::debit("Purchases", Decimal::from(50)).swapped();
        assert_eq!(line.debit_amount, Decimal::ZERO);
        assert_eq!(line.credit_amount, Decimal::from(50));
    }
}
