//! PAN (Permanent Account Number) extraction.

use super::patterns::{PAN_LABELED, PAN_STANDALONE};
use super::{ExtractionMatch, FieldExtractor, LABELED_CONFIDENCE, STANDALONE_CONFIDENCE};

/// PAN field extractor.
pub struct PanExtractor;

impl PanExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PanExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for PanExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<ExtractionMatch<String>> = Vec::new();

        for caps in PAN_LABELED.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let pan = m.as_str().to_uppercase();
            if holder_type(&pan).is_none() || results.iter().any(|r| r.value == pan) {
                continue;
            }
            results.push(
                ExtractionMatch::new(pan, LABELED_CONFIDENCE, m.as_str())
                    .with_position(m.start(), m.end()),
            );
        }

        for caps in PAN_STANDALONE.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let pan = m.as_str().to_string();
            if holder_type(&pan).is_none() || results.iter().any(|r| r.value == pan) {
                continue;
            }
            results.push(
                ExtractionMatch::new(pan, STANDALONE_CONFIDENCE, m.as_str())
                    .with_position(m.start(), m.end()),
            );
        }

        results
    }
}

/// Holder type encoded in the fourth PAN character.
pub fn holder_type(pan: &str) -> Option<&'static str> {
    if pan.len() != 10 {
        return None;
    }
    match pan.as_bytes()[3].to_ascii_uppercase() {
        b'P' => Some("Individual"),
        b'C' => Some("Company"),
        b'H' => Some("Hindu Undivided Family"),
        b'F' => Some("Firm"),
        b'A' => Some("Association of Persons"),
        b'T' => Some("Trust"),
        b'B' => Some("Body of Individuals"),
        b'L' => Some("Local Authority"),
        b'J' => Some("Artificial Juridical Person"),
        b'G' => Some("Government"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_type() {
        assert_eq!(holder_type("ABCPE1234F"), Some("Individual"));
        assert_eq!(holder_type("AABCU9603R"), Some("Company"));
        assert_eq!(holder_type("AABXU9603R"), None);
        assert_eq!(holder_type("ABC"), None);
    }

    #[test]
    fn test_extract_labeled() {
        let text = "INCOME TAX DEPARTMENT\nPermanent Account Number Card\nABCPE1234F\n";
        let m = PanExtractor::new().extract(text).unwrap();
        assert_eq!(m.value, "ABCPE1234F");
        assert_eq!(m.confidence, LABELED_CONFIDENCE);
    }

    #[test]
    fn test_extract_standalone() {
        let m = PanExtractor::new().extract("Card no ABCPE1234F issued").unwrap();
        assert_eq!(m.value, "ABCPE1234F");
        assert_eq!(m.confidence, STANDALONE_CONFIDENCE);
    }

    #[test]
    fn test_ignores_unknown_holder_type() {
        assert!(PanExtractor::new().extract("ABCXE1234F").is_none());
    }
}
