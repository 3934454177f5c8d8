//! GST registration certificate (Form REG-06) parser.

use crate::document::rules::patterns::{
    CONSTITUTION, LEGAL_NAME, REGISTRATION_DATE, REGISTRATION_TYPE, TRADE_NAME,
};
use crate::document::rules::{
    FieldExtractor, GstinExtractor, LABELED_CONFIDENCE, first_labeled_date, state_name,
};
use crate::document::{DocumentParser, ParsedFields};

use super::{clean_name, put_date};

pub const GSTIN: &str = "gstin";
pub const LEGAL_NAME_KEY: &str = "legal_name";
pub const TRADE_NAME_KEY: &str = "trade_name";
pub const REGISTRATION_DATE_KEY: &str = "registration_date";
pub const CONSTITUTION_KEY: &str = "constitution";
pub const REGISTRATION_TYPE_KEY: &str = "registration_type";
pub const STATE_CODE: &str = "state_code";
pub const STATE: &str = "state";
pub const PAN: &str = "pan";

/// Parser for GST registration certificates.
pub struct GstCertificateParser;

impl GstCertificateParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GstCertificateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for GstCertificateParser {
    fn parse(&self, text: &str) -> ParsedFields {
        let mut parsed = ParsedFields::new();

        if let Some(m) = GstinExtractor::new().extract(text) {
            let code = m.value[..2].to_string();
            if let Some(state) = state_name(&code) {
                parsed.insert(STATE, state, m.confidence);
            }
            parsed.insert(STATE_CODE, code, m.confidence);
            parsed.insert(PAN, m.value[2..12].to_string(), m.confidence);
            parsed.insert(GSTIN, m.value, m.confidence);
        }

        for (key, pattern) in [
            (LEGAL_NAME_KEY, &*LEGAL_NAME),
            (TRADE_NAME_KEY, &*TRADE_NAME),
            (CONSTITUTION_KEY, &*CONSTITUTION),
            (REGISTRATION_TYPE_KEY, &*REGISTRATION_TYPE),
        ] {
            if let Some(caps) = pattern.captures(text) {
                let value = clean_name(&caps[1]);
                if !value.is_empty() {
                    parsed.insert(key, value, LABELED_CONFIDENCE);
                }
            }
        }

        put_date(
            &mut parsed,
            REGISTRATION_DATE_KEY,
            first_labeled_date(&REGISTRATION_DATE, text),
        );

        parsed
    }
}
