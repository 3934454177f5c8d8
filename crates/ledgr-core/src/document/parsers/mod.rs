//! Per-document-type parsers.

pub mod bank_statement;
pub mod gst_certificate;
pub mod identity;
pub mod invoice;
pub mod receipt;

pub use bank_statement::BankStatementParser;
pub use gst_certificate::GstCertificateParser;
pub use identity::IdentityParser;
pub use invoice::InvoiceParser;
pub use receipt::ReceiptParser;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::rules::ExtractionMatch;
use super::ParsedFields;

/// Store an amount match as a decimal string.
pub(crate) fn put_amount(
    parsed: &mut ParsedFields,
    key: &str,
    m: Option<ExtractionMatch<Decimal>>,
) {
    if let Some(m) = m {
        parsed.insert(key, m.value.to_string(), m.confidence);
    }
}

/// Store a date match as `YYYY-MM-DD`.
pub(crate) fn put_date(
    parsed: &mut ParsedFields,
    key: &str,
    m: Option<ExtractionMatch<NaiveDate>>,
) {
    if let Some(m) = m {
        parsed.insert(key, m.value.format("%Y-%m-%d").to_string(), m.confidence);
    }
}

/// Store a string match.
pub(crate) fn put_string(parsed: &mut ParsedFields, key: &str, m: Option<ExtractionMatch<String>>) {
    if let Some(m) = m {
        parsed.insert(key, m.value, m.confidence);
    }
}

/// Trim trailing punctuation OCR often leaves on names.
pub(crate) fn clean_name(s: &str) -> String {
    s.trim()
        .trim_end_matches([',', ';', ':', '-', '|'])
        .trim()
        .to_string()
}
