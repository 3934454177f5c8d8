//! Aadhaar number extraction and Verhoeff checksum validation.

use super::patterns::AADHAAR_NUMBER;
use super::{ExtractionMatch, FieldExtractor, LABELED_CONFIDENCE};

const D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 7, 8, 6, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Aadhaar field extractor. Only numbers passing the Verhoeff check are returned.
pub struct AadhaarExtractor;

impl AadhaarExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AadhaarExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AadhaarExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<ExtractionMatch<String>> = Vec::new();

        for caps in AADHAAR_NUMBER.captures_iter(text) {
            let number = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
            if !validate_aadhaar(&number) || results.iter().any(|r| r.value == number) {
                continue;
            }
            if let Some(full) = caps.get(0) {
                results.push(
                    ExtractionMatch::new(number, LABELED_CONFIDENCE, full.as_str())
                        .with_position(full.start(), full.end()),
                );
            }
        }

        results
    }
}

/// Validate a 12-digit Aadhaar number (first digit 2-9, Verhoeff checksum).
pub fn validate_aadhaar(number: &str) -> bool {
    let digits: Vec<u8> = number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();

    if digits.len() != 12 || digits[0] < 2 {
        return false;
    }

    let check = digits
        .iter()
        .rev()
        .enumerate()
        .fold(0u8, |c, (i, &digit)| D[c as usize][P[i % 8][digit as usize] as usize]);
    check == 0
}

/// Mask all but the last four digits: `XXXX XXXX 1234`.
pub fn mask_aadhaar(number: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let last4 = if digits.len() >= 4 {
        &digits[digits.len() - 4..]
    } else {
        digits.as_str()
    };
    format!("XXXX XXXX {}", last4)
}
