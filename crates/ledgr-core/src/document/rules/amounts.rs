//! Amount parsing and text normalization for Indian documents.

use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;

use super::patterns::CURRENCY_SYMBOL;
use super::{ExtractionMatch, ordered_confidence};

/// Normalize OCR text before pattern matching.
///
/// Line structure and multi-space column gaps are kept so table rows can
/// still be split; currency markers and exotic whitespace are removed.
pub fn normalize_text(text: &str) -> String {
    let unified: String = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .map(|c| match c {
            '\u{00a0}' | '\u{2007}' | '\u{202f}' => ' ',
            '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            _ => c,
        })
        .collect();

    let stripped = CURRENCY_SYMBOL.replace_all(&unified, "");

    stripped
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse an amount written with Indian (`1,23,456.78`) or western
/// (`123,456.78`) grouping. Parenthesized values are negative.
pub fn parse_indian_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let negative = (trimmed.starts_with('(') && trimmed.ends_with(')')) || trimmed.contains('-');

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() || cleaned.matches('.').count() > 1 {
        return None;
    }

    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

/// Find the first labeled amount from an ordered pattern list.
pub fn first_labeled_amount(patterns: &[Regex], text: &str) -> Option<ExtractionMatch<Decimal>> {
    patterns.iter().enumerate().find_map(|(i, re)| {
        let caps = re.captures(text)?;
        let m = caps.get(1)?;
        let amount = parse_indian_amount(m.as_str())?;
        Some(
            ExtractionMatch::new(amount, ordered_confidence(i), m.as_str())
                .with_position(m.start(), m.end()),
        )
    })
}

/// Extract an amount using a single labeled pattern.
pub fn labeled_amount(pattern: &Regex, text: &str) -> Option<ExtractionMatch<Decimal>> {
    first_labeled_amount(std::slice::from_ref(pattern), text)
}
