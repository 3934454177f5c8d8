//! Bank account statement parser.

use crate::document::rules::amounts::labeled_amount;
use crate::document::rules::dates::parse_date;
use crate::document::rules::patterns::{
    ACCOUNT_HOLDER, ACCOUNT_NUMBER, BANK_NAME, CLOSING_BALANCE, IFSC, OPENING_BALANCE,
    STATEMENT_PERIOD, TRANSACTION_LINE,
};
use crate::document::rules::{LABELED_CONFIDENCE, STANDALONE_CONFIDENCE};
use crate::document::{DocumentParser, ParsedFields};

use super::{clean_name, put_amount};

pub const ACCOUNT_NUMBER_KEY: &str = "account_number";
pub const IFSC_KEY: &str = "ifsc";
pub const BANK_NAME_KEY: &str = "bank_name";
pub const ACCOUNT_HOLDER_KEY: &str = "account_holder";
pub const OPENING_BALANCE_KEY: &str = "opening_balance";
pub const CLOSING_BALANCE_KEY: &str = "closing_balance";
pub const PERIOD_START: &str = "period_start";
pub const PERIOD_END: &str = "period_end";
pub const TRANSACTION_COUNT: &str = "transaction_count";

/// Parser for bank statements.
pub struct BankStatementParser;

impl BankStatementParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BankStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for BankStatementParser {
    fn parse(&self, text: &str) -> ParsedFields {
        let mut parsed = ParsedFields::new();

        if let Some(caps) = ACCOUNT_NUMBER.captures(text) {
            parsed.insert(ACCOUNT_NUMBER_KEY, caps[1].to_string(), LABELED_CONFIDENCE);
        }
        if let Some(caps) = IFSC.captures(text) {
            parsed.insert(IFSC_KEY, caps[1].to_string(), LABELED_CONFIDENCE);
        }
        if let Some(caps) = BANK_NAME.captures(text) {
            parsed.insert(BANK_NAME_KEY, clean_name(&caps[1]), STANDALONE_CONFIDENCE);
        }
        if let Some(caps) = ACCOUNT_HOLDER.captures(text) {
            parsed.insert(ACCOUNT_HOLDER_KEY, clean_name(&caps[1]), LABELED_CONFIDENCE);
        }

        put_amount(&mut parsed, OPENING_BALANCE_KEY, labeled_amount(&OPENING_BALANCE, text));
        put_amount(&mut parsed, CLOSING_BALANCE_KEY, labeled_amount(&CLOSING_BALANCE, text));

        if let Some(caps) = STATEMENT_PERIOD.captures(text) {
            if let (Some(start), Some(end)) = (parse_date(&caps[1]), parse_date(&caps[2])) {
                let start = start.format("%Y-%m-%d").to_string();
                let end = end.format("%Y-%m-%d").to_string();
                parsed.insert(PERIOD_START, start, LABELED_CONFIDENCE);
                parsed.insert(PERIOD_END, end, LABELED_CONFIDENCE);
            }
        }

        let transactions = TRANSACTION_LINE.find_iter(text).count();
        if transactions > 0 {
            parsed.insert(TRANSACTION_COUNT, transactions, STANDALONE_CONFIDENCE);
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_statement() {
        let text = "State Bank of India\nAccount Name: Meera Iyer\nAccount No: 000123456789\nIFSC: SBIN0001234\nStatement Period: 01/04/2024 to 30/04/2024\nOpening Balance: 25,000.00\n02/04/2024  UPI/Grocer      450.00      24,550.00\n15/04/2024  NEFT/Salary   60,000.00     84,550.00\nClosing Balance: 84,550.00\n";
        let parsed = BankStatementParser::new().parse(text);

        assert_eq!(parsed.fields[BANK_NAME_KEY], json!("State Bank of India"));
        assert_eq!(parsed.fields[ACCOUNT_HOLDER_KEY], json!("Meera Iyer"));
        assert_eq!(parsed.fields[ACCOUNT_NUMBER_KEY], json!("000123456789"));
        assert_eq!(parsed.fields[IFSC_KEY], json!("SBIN0001234"));
        assert_eq!(parsed.fields[OPENING_BALANCE_KEY], json!("25000.00"));
        assert_eq!(parsed.fields[CLOSING_BALANCE_KEY], json!("84550.00"));
        assert_eq!(parsed.fields[PERIOD_START], json!("2024-04-01"));
        assert_eq!(parsed.fields[PERIOD_END], json!("2024-04-30"));
        assert_eq!(parsed.fields[TRANSACTION_COUNT], json!(2));
    }
}
