//! Rule-based document type classification.

use tracing::debug;

use crate::models::{Classification, DocumentType};

/// Confidence when the filename names the document type.
const FILENAME_CONFIDENCE: f32 = 0.95;

/// Confidence when nothing matched.
const FALLBACK_CONFIDENCE: f32 = 0.6;

/// Filename hints, checked in order. Hints of three letters or fewer must
/// match a whole token of the filename.
const FILENAME_HINTS: &[(DocumentType, &[&str])] = &[
    (DocumentType::Invoice, &["invoice", "inv", "bill"]),
    (DocumentType::Receipt, &["receipt", "rcpt"]),
    (
        DocumentType::GstCertificate,
        &["gst_certificate", "gst-certificate", "gstcertificate", "reg06", "gst_reg"],
    ),
    (DocumentType::Pan, &["pancard", "pan_card", "pan"]),
    (DocumentType::Aadhaar, &["aadhaar", "aadhar", "uidai"]),
    (DocumentType::BankStatement, &["statement", "passbook"]),
];

/// Text keywords with their confidence, checked in order. Invoice and
/// receipt keywords come before certificate keywords: a GST invoice
/// mentions GST as often as a GST certificate does.
const TEXT_KEYWORDS: &[(DocumentType, f32, &[&str])] = &[
    (
        DocumentType::Invoice,
        0.9,
        &["tax invoice", "invoice no", "invoice number", "invoice #", "bill of supply"],
    ),
    (
        DocumentType::Receipt,
        0.85,
        &["receipt", "cash memo", "payment received", "txn id"],
    ),
    (
        DocumentType::GstCertificate,
        0.9,
        &[
            "registration certificate",
            "certificate of registration",
            "form gst reg-06",
            "form gst reg 06",
        ],
    ),
    (
        DocumentType::Pan,
        0.9,
        &["permanent account number", "income tax department"],
    ),
    (
        DocumentType::Aadhaar,
        0.9,
        &["aadhaar", "unique identification authority", "uidai"],
    ),
    (
        DocumentType::BankStatement,
        0.85,
        &["statement of account", "account statement", "bank statement", "opening balance"],
    ),
    (DocumentType::Invoice, 0.75, &["invoice"]),
];

/// Assign a document type from raw text and an optional filename.
///
/// Filename hints take precedence over text keywords. Pure and
/// deterministic.
pub fn classify(raw_text: &str, filename_hint: Option<&str>) -> Classification {
    if let Some(doc_type) = filename_hint.and_then(classify_filename) {
        debug!("Classified as {} from filename", doc_type);
        return Classification::new(doc_type, FILENAME_CONFIDENCE);
    }

    let text = raw_text.to_lowercase();
    for (doc_type, confidence, keywords) in TEXT_KEYWORDS {
        if let Some(keyword) = keywords.iter().find(|k| text.contains(*k)) {
            debug!("Classified as {} from keyword '{}'", doc_type, keyword);
            return Classification::new(*doc_type, *confidence);
        }
    }

    Classification::new(DocumentType::Other, FALLBACK_CONFIDENCE)
}

fn classify_filename(filename: &str) -> Option<DocumentType> {
    let name = filename.to_lowercase();
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    FILENAME_HINTS
        .iter()
        .find(|(_, hints)| {
            hints.iter().any(|hint| {
                if hint.len() <= 3 {
                    tokens.contains(hint)
                } else {
                    name.contains(hint)
                }
            })
        })
        .map(|(doc_type, _)| *doc_type)
}
