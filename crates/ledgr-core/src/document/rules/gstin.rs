//! GSTIN (Indian GST registration number) extraction and validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::patterns::{GSTIN_LABELED, GSTIN_SHAPE, GSTIN_STANDALONE};
use super::{ExtractionMatch, FieldExtractor, LABELED_CONFIDENCE, STANDALONE_CONFIDENCE};

/// Check-character alphabet: digits then A-Z.
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Highest state code accepted by the checksum rule.
pub const MAX_STATE_CODE: u32 = 37;

/// State and union territory names indexed by GST state code.
const STATE_NAMES: [&str; 38] = [
    "Jammu and Kashmir",
    "Himachal Pradesh",
    "Punjab",
    "Chandigarh",
    "Uttarakhand",
    "Haryana",
    "Delhi",
    "Rajasthan",
    "Uttar Pradesh",
    "Bihar",
    "Sikkim",
    "Arunachal Pradesh",
    "Nagaland",
    "Manipur",
    "Mizoram",
    "Tripura",
    "Meghalaya",
    "Assam",
    "West Bengal",
    "Jharkhand",
    "Odisha",
    "Chhattisgarh",
    "Madhya Pradesh",
    "Gujarat",
    "Daman and Diu",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Maharashtra",
    "Andhra Pradesh (Old)",
    "Karnataka",
    "Goa",
    "Lakshadweep",
    "Kerala",
    "Tamil Nadu",
    "Puducherry",
    "Andaman and Nicobar Islands",
    "Telangana",
    "Andhra Pradesh",
    "Ladakh",
];

/// A GSTIN that passed shape, state-code and checksum validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gstin(String);

/// Reason a string is not a valid GSTIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GstinIssue {
    Length(usize),
    Shape,
    StateCode(String),
    Checksum { expected: char, found: char },
}

impl fmt::Display for GstinIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GstinIssue::Length(len) => write!(f, "expected 15 characters, found {}", len),
            GstinIssue::Shape => write!(f, "does not match the GSTIN format"),
            GstinIssue::StateCode(code) => write!(f, "state code {} is outside 01-37", code),
            GstinIssue::Checksum { expected, found } => {
                write!(f, "check character is {} but should be {}", found, expected)
            }
        }
    }
}

impl Gstin {
    /// Parse and fully validate a GSTIN.
    pub fn parse(s: &str) -> Result<Self, GstinIssue> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        check(&normalized)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-digit state code.
    pub fn state_code(&self) -> &str {
        &self.0[..2]
    }

    /// State or union territory name.
    pub fn state_name(&self) -> Option<&'static str> {
        state_name(self.state_code())
    }

    /// Embedded PAN (characters 3-12).
    pub fn pan(&self) -> &str {
        &self.0[2..12]
    }
}

impl fmt::Display for Gstin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Gstin {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Gstin::parse(&value).map_err(|e| format!("invalid GSTIN {}: {}", value, e))
    }
}

impl From<Gstin> for String {
    fn from(value: Gstin) -> Self {
        value.0
    }
}

fn check(gstin: &str) -> Result<(), GstinIssue> {
    let len = gstin.chars().count();
    if len != 15 {
        return Err(GstinIssue::Length(len));
    }
    if !GSTIN_SHAPE.is_match(gstin) {
        return Err(GstinIssue::Shape);
    }

    let code = &gstin[..2];
    match code.parse::<u32>() {
        Ok(n) if (1..=MAX_STATE_CODE).contains(&n) => {}
        _ => return Err(GstinIssue::StateCode(code.to_string())),
    }

    let expected = compute_check_char(&gstin[..14]).ok_or(GstinIssue::Shape)?;
    let found = gstin[14..].chars().next().ok_or(GstinIssue::Length(len))?;
    if expected != found {
        return Err(GstinIssue::Checksum { expected, found });
    }
    Ok(())
}

/// Validate a GSTIN: shape, state code range and check character.
pub fn validate_gstin(gstin: &str) -> bool {
    Gstin::parse(gstin).is_ok()
}

/// Describe why a GSTIN is invalid, or `None` if it is valid.
pub fn gstin_issue(gstin: &str) -> Option<GstinIssue> {
    Gstin::parse(gstin).err()
}

/// Compute the check character for the first 14 characters of a GSTIN.
///
/// Luhn mod 36: weights alternate 1, 2 from the left; each product is
/// folded as `p / 36 + p % 36` before summing.
pub fn compute_check_char(body: &str) -> Option<char> {
    if body.len() != 14 {
        return None;
    }

    let mut sum = 0u32;
    for (i, c) in body.bytes().enumerate() {
        let value = ALPHABET.iter().position(|&a| a == c.to_ascii_uppercase())? as u32;
        let product = value * if i % 2 == 0 { 1 } else { 2 };
        sum += product / 36 + product % 36;
    }

    let check = (36 - sum % 36) % 36;
    Some(ALPHABET[check as usize] as char)
}

/// Look up a state name by two-digit GST state code.
pub fn state_name(code: &str) -> Option<&'static str> {
    let n: usize = code.trim().parse().ok()?;
    STATE_NAMES.get(n.checked_sub(1)?).copied()
}

/// Look up a two-digit state code by (case-insensitive) state name.
///
/// Accepts `"27"`, `"27-Maharashtra"` and `"Maharashtra"` forms.
pub fn state_code_for(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 2 && state_name(&digits).is_some() {
        return Some(digits);
    }

    let lower = trimmed.to_lowercase();
    // Longest contained name wins ("Daman and Diu" vs the merged UT).
    let mut best: Option<(usize, usize)> = None;
    for (i, name) in STATE_NAMES.iter().enumerate() {
        let name_lower = name.to_lowercase();
        if lower.contains(&name_lower) && best.is_none_or(|(_, len)| name_lower.len() > len) {
            best = Some((i, name_lower.len()));
        }
    }
    best.map(|(i, _)| format!("{:02}", i + 1))
}

/// GSTIN field extractor.
///
/// Matches the GSTIN shape only; checksum and state validity are left to
/// the validation engine so a mistyped identifier is reported, not dropped.
pub struct GstinExtractor {
    validate: bool,
}

impl GstinExtractor {
    pub fn new() -> Self {
        Self { validate: false }
    }

    /// Only return identifiers that pass the checksum.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    fn accept(&self, gstin: &str) -> bool {
        !self.validate || validate_gstin(gstin)
    }
}

impl Default for GstinExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for GstinExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text)
            .into_iter()
            .min_by_key(|m| m.position.map(|(start, _)| start).unwrap_or(usize::MAX))
    }

    /// All distinct GSTINs, labeled ones at higher confidence, ordered by
    /// position in the text.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<ExtractionMatch<String>> = Vec::new();

        for caps in GSTIN_LABELED.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let gstin = m.as_str().to_uppercase();
            if results.iter().any(|r| r.value == gstin) || !self.accept(&gstin) {
                continue;
            }
            results.push(
                ExtractionMatch::new(gstin, LABELED_CONFIDENCE, m.as_str())
                    .with_position(m.start(), m.end()),
            );
        }

        for caps in GSTIN_STANDALONE.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let gstin = m.as_str().to_string();
            if results.iter().any(|r| r.value == gstin) || !self.accept(&gstin) {
                continue;
            }
            results.push(
                ExtractionMatch::new(gstin, STANDALONE_CONFIDENCE, m.as_str())
                    .with_position(m.start(), m.end()),
            );
        }

        results.sort_by_key(|m| m.position.map(|(start, _)| start).unwrap_or(usize::MAX));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID: &[&str] = &[
        "27AABCU9603R1ZN",
        "27AAPFU0939F1ZV",
        "29AAGCR4375J1ZU",
        "07AAACI1195H1ZO",
        "33AABCT1332L1ZL",
        "24AAACR5055K1ZD",
    ];

    #[test]
    fn test_valid_gstins() {
        for g in VALID {
            assert!(validate_gstin(g), "{} should be valid", g);
        }
    }

    #[test]
    fn test_check_char() {
        assert_eq!(compute_check_char("27AABCU9603R1Z"), Some('N'));
        assert_eq!(compute_check_char("29AAGCR4375J1Z"), Some('U'));
        assert_eq!(compute_check_char("short"), None);
    }

    #[test]
    fn test_wrong_check_char() {
        assert_eq!(
            gstin_issue("27AABCU9603R1ZM"),
            Some(GstinIssue::Checksum {
                expected: 'N',
                found: 'M'
            })
        );
    }

    #[test]
    fn test_single_substitution_detected() {
        let valid = "27AABCU9603R1ZN";
        let mut caught = 0;
        let mut total = 0;
        for pos in 2..14 {
            for &replacement in ALPHABET.iter() {
                let mut bytes = valid.as_bytes().to_vec();
                if bytes[pos] == replacement {
                    continue;
                }
                bytes[pos] = replacement;
                let mutated = String::from_utf8(bytes).unwrap();
                if !GSTIN_SHAPE.is_match(&mutated) {
                    continue;
                }
                total += 1;
                if !validate_gstin(&mutated) {
                    caught += 1;
                }
            }
        }
        assert!(total > 0);
        assert_eq!(caught, total);
    }

    #[test]
    fn test_state_code_range() {
        // Shape and check character are fine, but 38 is outside 01-37.
        assert_eq!(
            gstin_issue("38AABCL1234M1ZG"),
            Some(GstinIssue::StateCode("38".to_string()))
        );
        assert_eq!(state_name("38"), Some("Ladakh"));
    }

    #[test]
    fn test_shape_and_length() {
        assert_eq!(gstin_issue("27AABCU9603R1Z"), Some(GstinIssue::Length(14)));
        assert_eq!(gstin_issue("27AABCU9603R1XN"), Some(GstinIssue::Shape));
    }

    #[test]
    fn test_parse_accessors() {
        let gstin = Gstin::parse("27aabcu9603r1zn").unwrap();
        assert_eq!(gstin.as_str(), "27AABCU9603R1ZN");
        assert_eq!(gstin.state_code(), "27");
        assert_eq!(gstin.state_name(), Some("Maharashtra"));
        assert_eq!(gstin.pan(), "AABCU9603R");
    }

    #[test]
    fn test_state_lookup() {
        assert_eq!(state_name("07"), Some("Delhi"));
        assert_eq!(state_name("00"), None);
        assert_eq!(state_name("99"), None);
        assert_eq!(state_code_for("27-Maharashtra"), Some("27".to_string()));
        assert_eq!(state_code_for("Karnataka (29)"), Some("29".to_string()));
        assert_eq!(state_code_for("andhra pradesh"), Some("37".to_string()));
        assert_eq!(state_code_for("Narnia"), None);
    }

    #[test]
    fn test_extract_labeled_and_standalone() {
        let text = "Seller GSTIN: 27AABCU9603R1ZN\nShip to 29AAGCR4375J1ZU\nGSTIN: 27AABCU9603R1ZN";
        let results = GstinExtractor::new().extract_all(text);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].value, "27AABCU9603R1ZN");
        assert_eq!(results[0].confidence, LABELED_CONFIDENCE);
        assert_eq!(results[1].value, "29AAGCR4375J1ZU");
        assert_eq!(results[1].confidence, STANDALONE_CONFIDENCE);
    }

    #[test]
    fn test_extract_keeps_bad_checksum_unless_validating() {
        let text = "GSTIN: 27AABCU9603R1ZM";
        assert_eq!(
            GstinExtractor::new().extract(text).map(|m| m.value),
            Some("27AABCU9603R1ZM".to_string())
        );
        assert!(GstinExtractor::new().with_validation(true).extract(text).is_none());
    }
}
