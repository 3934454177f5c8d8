//! Date extraction for Indian documents (day-first formats).

use chrono::NaiveDate;
use regex::Regex;

use super::patterns::{DATE_DMY, DATE_LONG, DATE_YMD};
use super::{ExtractionMatch, FieldExtractor, ordered_confidence};

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        // Earliest match in the text wins, regardless of format.
        self.extract_all(text)
            .into_iter()
            .min_by_key(|m| m.position.map(|(start, _)| start).unwrap_or(usize::MAX))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<ExtractionMatch<NaiveDate>> = Vec::new();

        // YYYY-MM-DD first so DMY does not misread its tail.
        for caps in DATE_YMD.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);

            if let (Some(date), Some(full)) =
                (NaiveDate::from_ymd_opt(year, month, day), caps.get(0))
            {
                results.push(
                    ExtractionMatch::new(date, 0.9, full.as_str())
                        .with_position(full.start(), full.end()),
                );
            }
        }

        // DD/MM/YYYY, DD-MM-YY, DD.MM.YYYY
        for caps in DATE_DMY.captures_iter(text) {
            let Some(full) = caps.get(0) else { continue };
            if overlaps(&results, full.start(), full.end()) {
                continue;
            }
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[3]);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                results.push(
                    ExtractionMatch::new(date, 0.9, full.as_str())
                        .with_position(full.start(), full.end()),
                );
            }
        }

        // 15-Mar-2024, 15th March, 2024
        for caps in DATE_LONG.captures_iter(text) {
            let Some(full) = caps.get(0) else { continue };
            if overlaps(&results, full.start(), full.end()) {
                continue;
            }
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month = month_to_number(&caps[2]);
            let year: i32 = caps[3].parse().unwrap_or(0);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                results.push(
                    ExtractionMatch::new(date, 0.95, full.as_str())
                        .with_position(full.start(), full.end()),
                );
            }
        }

        results
    }
}

fn overlaps(found: &[ExtractionMatch<NaiveDate>], start: usize, end: usize) -> bool {
    found
        .iter()
        .filter_map(|m| m.position)
        .any(|(s, e)| start < e && s < end)
}

/// Find the first labeled date from an ordered pattern list.
///
/// Each pattern captures the text after its label; the first date inside
/// that text is taken.
pub fn first_labeled_date(patterns: &[Regex], text: &str) -> Option<ExtractionMatch<NaiveDate>> {
    let extractor = DateExtractor::new();
    patterns.iter().enumerate().find_map(|(i, re)| {
        re.captures_iter(text).find_map(|caps| {
            let label_text = caps.get(1)?;
            let date = extractor.extract(label_text.as_str())?;
            Some(ExtractionMatch::new(
                date.value,
                ordered_confidence(i),
                label_text.as_str(),
            ))
        })
    })
}

/// Parse any date in the given string.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(text).map(|m| m.value)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn month_to_number(month: &str) -> u32 {
    match month.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => 0,
    }
}
