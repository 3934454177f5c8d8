//! Retail receipt parser.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::document::rules::patterns::*;
use crate::document::rules::{
    DERIVED_CONFIDENCE, DateExtractor, ExtractionMatch, FieldExtractor, GstinExtractor,
    LABELED_CONFIDENCE, STANDALONE_CONFIDENCE, first_capture, first_labeled_amount,
};
use crate::document::{DocumentParser, ParsedFields};
use crate::models::invoice::{decimal_value, keys};

use super::{clean_name, put_amount, put_date, put_string};

/// Parser for receipts and cash memos.
///
/// Receipt fields share the invoice keys so a receipt can flow through
/// validation and journal generation like a small invoice.
pub struct ReceiptParser;

impl ReceiptParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReceiptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for ReceiptParser {
    fn parse(&self, text: &str) -> ParsedFields {
        let mut parsed = ParsedFields::new();

        put_string(&mut parsed, keys::INVOICE_NUMBER, first_capture(&RECEIPT_NUMBER, text));

        // Merchant name: first plain line of the header block.
        let merchant = text
            .lines()
            .map(str::trim)
            .take(5)
            .find(|line| {
                !line.is_empty()
                    && line.chars().next().is_some_and(char::is_alphabetic)
                    && !line.contains(':')
                    && !DOCUMENT_TITLE.is_match(line)
            })
            .map(|line| ExtractionMatch::new(clean_name(line), STANDALONE_CONFIDENCE, line));
        put_string(&mut parsed, keys::VENDOR_NAME, merchant);

        let date = DateExtractor::new().extract(text);
        put_date(&mut parsed, keys::INVOICE_DATE, date);

        put_string(&mut parsed, keys::VENDOR_GSTIN, GstinExtractor::new().extract(text));

        put_amount(&mut parsed, keys::GRAND_TOTAL, first_labeled_amount(&GRAND_TOTAL, text));
        for (key, pattern) in [
            (keys::CGST, &*CGST),
            (keys::SGST, &*SGST),
            (keys::IGST, &*IGST),
            (keys::ROUND_OFF, &*ROUND_OFF),
        ] {
            put_amount(
                &mut parsed,
                key,
                first_labeled_amount(std::slice::from_ref(pattern), text),
            );
        }

        if let Some(caps) = PAYMENT_MODE.captures(text) {
            let mode = normalize_payment_mode(&caps[1]);
            parsed.insert(keys::PAYMENT_MODE, Value::from(mode), LABELED_CONFIDENCE);
        }

        // Printed receipts rarely carry a subtotal; derive it when taxes are itemized.
        if !parsed.contains(keys::SUBTOTAL) {
            if let Some(total) = parsed
                .fields
                .get(keys::GRAND_TOTAL)
                .and_then(decimal_value)
            {
                let taxes: Decimal = [keys::CGST, keys::SGST, keys::IGST, keys::ROUND_OFF]
                    .iter()
                    .filter_map(|k| parsed.fields.get(*k))
                    .filter_map(decimal_value)
                    .sum();
                if !taxes.is_zero() {
                    parsed.insert(keys::SUBTOTAL, (total - taxes).to_string(), DERIVED_CONFIDENCE);
                }
            }
        }

        parsed
    }
}

fn normalize_payment_mode(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("upi") {
        "upi"
    } else if lower.contains("card") {
        "card"
    } else if lower.contains("cash") {
        "cash"
    } else if lower.contains("net") {
        "net_banking"
    } else if lower.contains("wallet") {
        "wallet"
    } else {
        "cheque"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::rules::normalize_text;
    use crate::models::invoice::InvoiceData;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_receipt() {
        let text = "Fresh Mart Supermarket\nGSTIN: 29AAGCR4375J1ZU\nReceipt No: R-7781\n12/06/2024 18:42\nCGST: 25.00\nSGST: 25.00\nTotal: ₹ 1,050.00\nPaid by UPI\n";
        let parsed = ReceiptParser::new().parse(&normalize_text(text));
        let receipt = InvoiceData::from_fields(&parsed.fields);

        assert_eq!(receipt.vendor_name.as_deref(), Some("Fresh Mart Supermarket"));
        assert_eq!(receipt.invoice_number.as_deref(), Some("R-7781"));
        assert_eq!(receipt.invoice_date, NaiveDate::from_ymd_opt(2024, 6, 12));
        assert_eq!(receipt.vendor_gstin.as_deref(), Some("29AAGCR4375J1ZU"));
        assert_eq!(receipt.grand_total, Some(Decimal::from(1050)));
        assert_eq!(receipt.subtotal, Some(Decimal::from(1000)));
        assert_eq!(parsed.fields[keys::PAYMENT_MODE], "upi");
    }

    #[test]
    fn test_payment_modes() {
        assert_eq!(normalize_payment_mode("Credit Card"), "card");
        assert_eq!(normalize_payment_mode("CASH"), "cash");
        assert_eq!(normalize_payment_mode("Net Banking"), "net_banking");
    }
}
