//! Common regex patterns for Indian invoice and KYC extraction.
//!
//! Ordered pattern lists go from most to least specific; extractors take
//! the first match.

use lazy_static::lazy_static;
use regex::Regex;

/// Amount capture shared by the labeled patterns (Indian or western grouping).
const AMT: &str = r"([0-9][0-9,]*(?:\.[0-9]{1,2})?)";

/// Optional tax rate between a tax label and its amount, e.g. `@ 9%` or `(9%)`.
const RATE: &str = r"(?:@?\s*\(?\s*[0-9]+(?:\.[0-9]+)?\s*%\s*\)?)?";

fn amount_after(label: &str) -> Regex {
    Regex::new(&format!(r"(?im){label}\s*(?:\([^)\n]*\))?\s*[:\-]?\s*{AMT}")).unwrap()
}

fn tax_amount(label: &str) -> Regex {
    Regex::new(&format!(r"(?im)\b{label}\b\s*{RATE}\s*[:\-]?\s*{AMT}")).unwrap()
}

lazy_static! {
    // Text normalization
    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(
        r"(?i)₹|\bRs\b\.?|\bINR\b"
    ).unwrap();

    // GSTIN (15 chars: state, PAN, entity, 'Z', check)
    pub static ref GSTIN_LABELED: Regex = Regex::new(
        r"(?i)(?:GSTIN|GST\s*(?:No|Number|Reg(?:istration)?\s*No)\.?)(?:/UIN)?\s*[:\-]?\s*([0-9]{2}[A-Za-z]{5}[0-9]{4}[A-Za-z][0-9A-Za-z][Zz][0-9A-Za-z])"
    ).unwrap();

    pub static ref GSTIN_STANDALONE: Regex = Regex::new(
        r"\b([0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z]Z[0-9A-Z])\b"
    ).unwrap();

    pub static ref GSTIN_SHAPE: Regex = Regex::new(
        r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z]Z[0-9A-Z]$"
    ).unwrap();

    // PAN (AAAAA9999A)
    pub static ref PAN_LABELED: Regex = Regex::new(
        r"(?i)\b(?:PAN|Permanent\s+Account\s+Number)(?:\s*(?:No|Number|Card)\.?)?[^A-Za-z0-9\n]{0,10}\n?\s*([A-Za-z]{5}[0-9]{4}[A-Za-z])\b"
    ).unwrap();

    pub static ref PAN_STANDALONE: Regex = Regex::new(
        r"\b([A-Z]{5}[0-9]{4}[A-Z])\b"
    ).unwrap();

    // Aadhaar (12 digits, grouped 4-4-4)
    pub static ref AADHAAR_NUMBER: Regex = Regex::new(
        r"\b([2-9][0-9]{3})[\s\-]?([0-9]{4})[\s\-]?([0-9]{4})\b"
    ).unwrap();

    // Bank details
    pub static ref IFSC: Regex = Regex::new(
        r"\b([A-Z]{4}0[A-Z0-9]{6})\b"
    ).unwrap();

    pub static ref ACCOUNT_NUMBER: Regex = Regex::new(
        r"(?i)(?:a/c|account)\s*(?:no\.?|number|#)?\s*[:\-]?\s*([0-9]{9,18})\b"
    ).unwrap();

    // Dates
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_LONG: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?[\s\-./]*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[\s\-./,]*(\d{4})\b"
    ).unwrap();

    pub static ref INVOICE_DATE: Vec<Regex> = vec![
        Regex::new(r"(?im)(?:invoice|bill|inv\.?)\s*date\s*[:\-]?\s*(.+?)$").unwrap(),
        Regex::new(r"(?im)^\s*dated?\s*(?:of\s*issue)?\s*[:\-]?\s*(.+?)$").unwrap(),
        Regex::new(r"(?im)(?:\s{2,}|\t|\|)\s*dated?\s*[:\-]\s*(.+?)$").unwrap(),
    ];

    pub static ref DUE_DATE: Vec<Regex> = vec![
        Regex::new(r"(?im)due\s*date\s*[:\-]?\s*(.+?)$").unwrap(),
        Regex::new(r"(?im)(?:payment\s*due|due\s*by|pay\s*by)\s*(?:on)?\s*[:\-]?\s*(.+?)$").unwrap(),
    ];

    pub static ref DATE_OF_BIRTH: Vec<Regex> = vec![
        Regex::new(r"(?im)(?:date\s*of\s*birth|DOB|birth\s*date)\s*[:/\-]?\s*(.+?)$").unwrap(),
        Regex::new(r"(?im)year\s*of\s*birth\s*[:\-]?\s*(\d{4})").unwrap(),
    ];

    // Invoice identification
    pub static ref INVOICE_NUMBER: Vec<Regex> = vec![
        Regex::new(r"(?i)invoice\s*(?:no\.?|number|#)\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
        Regex::new(r"(?i)bill\s*(?:no\.?|number|#)\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
        Regex::new(r"(?i)\b(?:inv|ref)\s*(?:no\.?|#)?\s*[:\-]\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
    ];

    pub static ref RECEIPT_NUMBER: Vec<Regex> = vec![
        Regex::new(r"(?i)receipt\s*(?:no\.?|number|#)\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
        Regex::new(r"(?i)(?:bill|txn|transaction)\s*(?:no\.?|id|number|#)\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
    ];

    // Parties
    pub static ref SELLER_SECTION: Regex = Regex::new(
        r"(?im)^\s*(?:sold\s*by|seller|supplier|vendor|billed\s*by|from)\b\s*(?:details)?\s*[:\-]?\s*(.*)$"
    ).unwrap();

    pub static ref BUYER_SECTION: Regex = Regex::new(
        r"(?im)^\s*(?:bill(?:ed)?\s*to|buyer|customer|sold\s*to|ship(?:ped)?\s*to|recipient|consignee)\b\s*(?:details)?\s*[:\-]?\s*(.*)$"
    ).unwrap();

    pub static ref PLACE_OF_SUPPLY: Regex = Regex::new(
        r"(?im)place\s*of\s*supply\s*[:\-]?\s*(.+?)$"
    ).unwrap();

    pub static ref SUPPLY_TYPE: Regex = Regex::new(
        r"(?i)\b(B2B|B2CS|B2CL|B2C)\b"
    ).unwrap();

    pub static ref INVOICE_KIND: Regex = Regex::new(
        r"(?i)\b(purchase|sales?)\s+(?:invoice|bill)\b"
    ).unwrap();

    pub static ref DOCUMENT_TITLE: Regex = Regex::new(
        r"(?i)^\s*(?:tax\s+invoice|invoice|bill\s+of\s+supply|receipt|cash\s+memo|original(?:\s+for\s+recipient)?|duplicate|copy)\s*$"
    ).unwrap();

    // Totals, ordered most to least specific
    pub static ref GRAND_TOTAL: Vec<Regex> = vec![
        amount_after(r"grand\s*total"),
        amount_after(r"(?:total\s*amount\s*payable|amount\s*payable|net\s*payable|total\s*payable|invoice\s*total|total\s*invoice\s*value)"),
        amount_after(r"total\s*amount"),
        amount_after(r"^\s*total"),
    ];

    pub static ref SUBTOTAL: Vec<Regex> = vec![
        amount_after(r"sub\s*-?\s*total"),
        amount_after(r"(?:total\s*)?taxable\s*(?:value|amount)"),
        amount_after(r"(?:total\s*before\s*tax|amount\s*before\s*tax|net\s*amount)"),
    ];

    pub static ref CGST: Regex = tax_amount("CGST");
    pub static ref SGST: Regex = tax_amount(r"(?:SGST|UTGST)");
    pub static ref IGST: Regex = tax_amount("IGST");
    pub static ref CESS: Regex = tax_amount(r"(?:compensation\s*)?cess");

    pub static ref ROUND_OFF: Regex = Regex::new(
        r"(?im)round(?:ing|ed)?\s*off\s*:?\s*(\(?\s*[+\-]?\s*[0-9][0-9,]*(?:\.[0-9]{1,2})?\s*\)?)"
    ).unwrap();

    // Line item tables
    pub static ref TABLE_HEADER: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:description|particulars|items?|products?|services?)\b.*\b(?:qty|quantity|rate|amount|hsn|sac)\b").unwrap(),
        Regex::new(r"(?i)\b(?:s\.?\s*no|sr\.?\s*no|sl\.?\s*no)\b.*\b(?:amount|rate)\b").unwrap(),
        Regex::new(r"(?i)\bhsn(?:\s*/\s*sac)?\b.*\b(?:amount|rate)\b").unwrap(),
    ];

    pub static ref TABLE_END: Regex = Regex::new(
        r"(?i)^\s*(?:sub\s*-?\s*total|total|taxable|cgst|sgst|utgst|igst|cess|tax\b|grand|round|amount\s*in\s*words|net\s*payable|amount\s*payable)"
    ).unwrap();

    pub static ref COLUMN_SPLIT: Regex = Regex::new(
        r"\t+|\s{2,}|\s*\|\s*"
    ).unwrap();

    pub static ref NUMERIC_COLUMN: Regex = Regex::new(
        r"^[0-9][0-9,]*(?:\.[0-9]+)?%?$"
    ).unwrap();

    pub static ref HSN_COLUMN: Regex = Regex::new(
        r"^[0-9]{4,8}$"
    ).unwrap();

    pub static ref INLINE_ITEM: Regex = Regex::new(
        r"(?m)^\s*([A-Za-z][A-Za-z0-9 &().,/\-]*?)\s+([0-9]+(?:\.[0-9]+)?)\s+(?:[xX@]\s*)?([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s+([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s*$"
    ).unwrap();

    // Receipts
    pub static ref PAYMENT_MODE: Regex = Regex::new(
        r"(?i)\b(cash|upi|credit\s*card|debit\s*card|card|net\s*banking|wallet|cheque)\b"
    ).unwrap();

    // KYC
    pub static ref HOLDER_NAME: Vec<Regex> = vec![
        Regex::new(r"(?im)^\s*name\s*[:/\-]?\s*([A-Za-z][A-Za-z .']+?)\s*$").unwrap(),
        Regex::new(r"(?im)^\s*(?:holder'?s?\s*name|name\s*of\s*(?:the\s*)?(?:holder|card\s*holder))\s*[:/\-]?\s*([A-Za-z][A-Za-z .']+?)\s*$").unwrap(),
    ];

    pub static ref FATHER_NAME: Regex = Regex::new(
        r"(?im)^\s*father'?s?\s*name\s*[:/\-]?\s*([A-Za-z][A-Za-z .']+?)\s*$"
    ).unwrap();

    pub static ref GENDER: Regex = Regex::new(
        r"(?i)\b(male|female|transgender)\b"
    ).unwrap();

    pub static ref LEGAL_NAME: Regex = Regex::new(
        r"(?im)legal\s*name(?:\s*of\s*(?:the\s*)?business)?\s*[:\-]?\s*(.+?)$"
    ).unwrap();

    pub static ref TRADE_NAME: Regex = Regex::new(
        r"(?im)trade\s*name(?:,?\s*if\s*any)?\s*[:\-]?\s*(.+?)$"
    ).unwrap();

    pub static ref CONSTITUTION: Regex = Regex::new(
        r"(?im)constitution\s*of\s*business\s*[:\-]?\s*(.+?)$"
    ).unwrap();

    pub static ref REGISTRATION_DATE: Vec<Regex> = vec![
        Regex::new(r"(?im)date\s*of\s*liability\s*[:\-]?\s*(.+?)$").unwrap(),
        Regex::new(r"(?im)(?:date\s*of\s*validity\s*from|valid\s*from|registration\s*date|date\s*of\s*registration)\s*[:\-]?\s*(.+?)$").unwrap(),
    ];

    pub static ref REGISTRATION_TYPE: Regex = Regex::new(
        r"(?im)type\s*of\s*registration\s*[:\-]?\s*(.+?)$"
    ).unwrap();

    // Bank statements
    pub static ref ACCOUNT_HOLDER: Regex = Regex::new(
        r"(?im)^\s*(?:account\s*(?:holder|name)|customer\s*name|name)\s*[:\-]?\s*([A-Za-z][A-Za-z .']+?)\s*$"
    ).unwrap();

    pub static ref OPENING_BALANCE: Regex = amount_after(r"opening\s*balance");
    pub static ref CLOSING_BALANCE: Regex = amount_after(r"closing\s*balance");

    pub static ref STATEMENT_PERIOD: Regex = Regex::new(
        r"(?im)(?:statement\s*period|period|from)\s*[:\-]?\s*(.+?)\s+(?:to|till|-)\s+(.+?)$"
    ).unwrap();

    pub static ref BANK_NAME: Regex = Regex::new(
        r"(?im)^\s*([A-Za-z][A-Za-z &.]*\bbank\b[A-Za-z &.]*)"
    ).unwrap();

    pub static ref TRANSACTION_LINE: Regex = Regex::new(
        r"(?m)^\s*\d{1,2}[./\-](?:\d{1,2}|[A-Za-z]{3})[./\-]\d{2,4}\b"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_amount_skips_rate() {
        let caps = CGST.captures("CGST @ 9%: 900.00").unwrap();
        assert_eq!(&caps[1], "900.00");

        let caps = SGST.captures("SGST (9%) 900").unwrap();
        assert_eq!(&caps[1], "900");

        let caps = IGST.captures("IGST: 1,800.00").unwrap();
        assert_eq!(&caps[1], "1,800.00");
    }

    #[test]
    fn test_total_does_not_match_total_tax() {
        let re = &GRAND_TOTAL[3];
        assert!(re.captures("Total Tax: 1800").is_none());
        assert_eq!(&re.captures("Total: 11,800.00").unwrap()[1], "11,800.00");
    }

    #[test]
    fn test_table_end_keywords() {
        assert!(TABLE_END.is_match("Sub Total      10000.00"));
        assert!(TABLE_END.is_match("  CGST @ 9%  900"));
        assert!(!TABLE_END.is_match("1  Consulting services  998311  1  10000.00  10000.00"));
    }

    #[test]
    fn test_column_split() {
        let cols: Vec<&str> = COLUMN_SPLIT
            .split("1  Laptop stand\t8473  2  500.00  1000.00")
            .collect();
        assert_eq!(cols, vec!["1", "Laptop stand", "8473", "2", "500.00", "1000.00"]);
    }
}
