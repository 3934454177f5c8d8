//! PAN card and Aadhaar card parsers.

use serde_json::Value;

use crate::document::rules::patterns::{DATE_OF_BIRTH, FATHER_NAME, GENDER, HOLDER_NAME};
use crate::document::rules::{
    AadhaarExtractor, ExtractionMatch, FALLBACK_CONFIDENCE, FieldExtractor, LABELED_CONFIDENCE,
    PanExtractor, first_capture, first_labeled_date, holder_type, mask_aadhaar,
};
use crate::document::{DocumentParser, ParsedFields};

use super::{clean_name, put_date, put_string};

pub const PAN_NUMBER: &str = "pan_number";
pub const HOLDER_TYPE: &str = "holder_type";
pub const AADHAAR_NUMBER: &str = "aadhaar_number";
pub const NAME: &str = "name";
pub const FATHER: &str = "father_name";
pub const DATE_OF_BIRTH_KEY: &str = "date_of_birth";
pub const YEAR_OF_BIRTH: &str = "year_of_birth";
pub const GENDER_KEY: &str = "gender";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityKind {
    Pan,
    Aadhaar,
}

/// Parser for identity cards.
pub struct IdentityParser {
    kind: IdentityKind,
}

impl IdentityParser {
    /// PAN card parser.
    pub fn pan() -> Self {
        Self {
            kind: IdentityKind::Pan,
        }
    }

    /// Aadhaar card parser. Only the masked number is returned.
    pub fn aadhaar() -> Self {
        Self {
            kind: IdentityKind::Aadhaar,
        }
    }

    fn extract_common(&self, text: &str, parsed: &mut ParsedFields) {
        let name = first_capture(&HOLDER_NAME, text)
            .map(|m| ExtractionMatch::new(clean_name(&m.value), m.confidence, m.source))
            .or_else(|| name_after_label(text));
        put_string(parsed, NAME, name);

        put_date(
            parsed,
            DATE_OF_BIRTH_KEY,
            first_labeled_date(&DATE_OF_BIRTH[..1], text),
        );
        if !parsed.contains(DATE_OF_BIRTH_KEY) {
            if let Some(caps) = DATE_OF_BIRTH[1].captures(text) {
                parsed.insert(YEAR_OF_BIRTH, caps[1].to_string(), FALLBACK_CONFIDENCE);
            }
        }
    }
}

/// Cards often print the label on one line and the value on the next.
fn name_after_label(text: &str) -> Option<ExtractionMatch<String>> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    lines.windows(2).find_map(|pair| {
        let label = pair[0].to_lowercase();
        let value = pair[1];
        let is_label = label == "name" || label == "name /" || label.ends_with("/ name");
        let plain = value.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '.');
        (is_label && plain && !value.is_empty())
            .then(|| ExtractionMatch::new(clean_name(value), FALLBACK_CONFIDENCE, value))
    })
}

impl DocumentParser for IdentityParser {
    fn parse(&self, text: &str) -> ParsedFields {
        let mut parsed = ParsedFields::new();
        self.extract_common(text, &mut parsed);

        match self.kind {
            IdentityKind::Pan => {
                if let Some(m) = PanExtractor::new().extract(text) {
                    if let Some(holder) = holder_type(&m.value) {
                        parsed.insert(HOLDER_TYPE, holder, m.confidence);
                    }
                    parsed.insert(PAN_NUMBER, m.value, m.confidence);
                }
                if let Some(caps) = FATHER_NAME.captures(text) {
                    parsed.insert(FATHER, clean_name(&caps[1]), LABELED_CONFIDENCE);
                }
            }
            IdentityKind::Aadhaar => {
                if let Some(m) = AadhaarExtractor::new().extract(text) {
                    parsed.insert(AADHAAR_NUMBER, mask_aadhaar(&m.value), m.confidence);
                }
                if let Some(caps) = GENDER.captures(text) {
                    let gender = caps[1].to_lowercase();
                    parsed.insert(GENDER_KEY, Value::from(gender), LABELED_CONFIDENCE);
                }
            }
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pan_card() {
        let text = "INCOME TAX DEPARTMENT\nGOVT. OF INDIA\nName: RAHUL SHARMA\nFather's Name: VIJAY SHARMA\nDate of Birth: 05/08/1990\nPermanent Account Number\nABCPS1234K\n";
        let parsed = IdentityParser::pan().parse(text);

        assert_eq!(parsed.fields[PAN_NUMBER], "ABCPS1234K");
        assert_eq!(parsed.fields[HOLDER_TYPE], "Individual");
        assert_eq!(parsed.fields[NAME], "RAHUL SHARMA");
        assert_eq!(parsed.fields[FATHER], "VIJAY SHARMA");
        assert_eq!(parsed.fields[DATE_OF_BIRTH_KEY], "1990-08-05");
    }

    #[test]
    fn test_parse_aadhaar_masks_number() {
        let text = "Government of India\nName\nPriya Nair\nYear of Birth: 1988\nFEMALE\n4996 1234 5671\n";
        let parsed = IdentityParser::aadhaar().parse(text);

        assert_eq!(parsed.fields[AADHAAR_NUMBER], "XXXX XXXX 5671");
        assert_eq!(parsed.fields[NAME], "Priya Nair");
        assert_eq!(parsed.fields[YEAR_OF_BIRTH], "1988");
        assert_eq!(parsed.fields[GENDER_KEY], "female");
        assert!(!parsed.contains(PAN_NUMBER));
    }

    #[test]
    fn test_invalid_aadhaar_is_absent() {
        let parsed = IdentityParser::aadhaar().parse("2341 2341 2347");
        assert!(!parsed.contains(AADHAAR_NUMBER));
    }
}
