//! GST tax invoice parser.

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info};

use crate::document::rules::gstin::state_code_for;
use crate::document::rules::patterns::*;
use crate::document::rules::{
    DERIVED_CONFIDENCE, DateExtractor, ExtractionMatch, FALLBACK_CONFIDENCE, FieldExtractor,
    GstinExtractor, LABELED_CONFIDENCE, STANDALONE_CONFIDENCE, first_capture, first_labeled_amount,
    first_labeled_date, parse_indian_amount,
};
use crate::document::{DocumentParser, ParsedFields};
use crate::models::invoice::{InvoiceKind, InvoiceLine, SupplyType, decimal_value, keys};

use super::{clean_name, put_amount, put_date, put_string};

/// Rule-based parser for GST invoices.
pub struct InvoiceParser {
    /// Derive missing CGST/SGST/IGST from `grand_total - subtotal`.
    infer_tax: bool,
}

impl InvoiceParser {
    pub fn new() -> Self {
        Self { infer_tax: true }
    }

    /// Enable or disable tax component inference.
    pub fn with_tax_inference(mut self, infer: bool) -> Self {
        self.infer_tax = infer;
        self
    }

    fn extract_dates(&self, text: &str, parsed: &mut ParsedFields) {
        let due = first_labeled_date(&DUE_DATE, text);
        let due_value = due.as_ref().map(|m| m.value);

        let issued = first_labeled_date(&INVOICE_DATE, text).or_else(|| {
            // Unlabeled: first date in the document that is not the due date.
            DateExtractor::new()
                .extract_all(text)
                .into_iter()
                .filter(|m| Some(m.value) != due_value)
                .min_by_key(|m| m.position.map(|(s, _)| s).unwrap_or(usize::MAX))
                .map(|m| ExtractionMatch::new(m.value, STANDALONE_CONFIDENCE, m.source))
        });

        put_date(parsed, keys::INVOICE_DATE, issued);
        put_date(parsed, keys::DUE_DATE, due);
    }

    fn extract_parties(&self, text: &str, parsed: &mut ParsedFields) {
        let (seller_text, buyer_text) = split_sections(text);
        let extractor = GstinExtractor::new();
        let all = extractor.extract_all(text);

        // Vendor: first GSTIN in the seller section, else first overall.
        let vendor = seller_text
            .and_then(|s| extractor.extract(s))
            .or_else(|| all.first().cloned());
        let vendor_value = vendor.as_ref().map(|m| m.value.clone());

        // Buyer: first different GSTIN in the buyer section, else next distinct overall.
        let buyer = buyer_text
            .map(|b| extractor.extract_all(b))
            .and_then(|found| {
                found
                    .into_iter()
                    .find(|m| Some(&m.value) != vendor_value.as_ref())
            })
            .or_else(|| {
                all.iter()
                    .find(|m| Some(&m.value) != vendor_value.as_ref())
                    .cloned()
            });

        put_string(parsed, keys::VENDOR_GSTIN, vendor);
        put_string(parsed, keys::BUYER_GSTIN, buyer);

        let vendor_name = match seller_text {
            Some(section) => party_name(section, &SELLER_SECTION),
            None => heading_name(text),
        };
        put_string(parsed, keys::VENDOR_NAME, vendor_name);
        put_string(
            parsed,
            keys::BUYER_NAME,
            buyer_text.and_then(|section| party_name(section, &BUYER_SECTION)),
        );

        if let Some(caps) = PLACE_OF_SUPPLY.captures(text) {
            if let Some(code) = caps.get(1).and_then(|m| state_code_for(m.as_str())) {
                parsed.insert(keys::PLACE_OF_SUPPLY, code, LABELED_CONFIDENCE);
            }
        }
    }

    fn extract_amounts(&self, text: &str, parsed: &mut ParsedFields) {
        put_amount(parsed, keys::SUBTOTAL, first_labeled_amount(&SUBTOTAL, text));
        put_amount(parsed, keys::GRAND_TOTAL, first_labeled_amount(&GRAND_TOTAL, text));

        for (key, pattern) in [
            (keys::CGST, &*CGST),
            (keys::SGST, &*SGST),
            (keys::IGST, &*IGST),
            (keys::CESS, &*CESS),
            (keys::ROUND_OFF, &*ROUND_OFF),
        ] {
            put_amount(parsed, key, first_labeled_amount(std::slice::from_ref(pattern), text));
        }
    }

    fn extract_line_items(&self, text: &str) -> (Vec<InvoiceLine>, f32) {
        let items = table_items(text);
        if !items.is_empty() {
            return (items, FALLBACK_CONFIDENCE);
        }
        (inline_items(text), STANDALONE_CONFIDENCE)
    }

    /// Fill missing tax components from `grand_total - subtotal`.
    ///
    /// This is an approximation, not a rate-table computation: the whole
    /// delta goes to IGST when the text mentions it, otherwise it is split
    /// evenly between CGST and SGST.
    fn infer_tax_components(&self, text: &str, parsed: &mut ParsedFields) {
        if [keys::CGST, keys::SGST, keys::IGST]
            .iter()
            .any(|k| parsed.contains(k))
        {
            return;
        }

        let amount = |key: &str| parsed.fields.get(key).and_then(decimal_value);
        let (Some(subtotal), Some(total)) = (amount(keys::SUBTOTAL), amount(keys::GRAND_TOTAL))
        else {
            return;
        };
        let cess = amount(keys::CESS).unwrap_or_default();
        let round_off = amount(keys::ROUND_OFF).unwrap_or_default();

        let delta = total - subtotal - cess - round_off;
        if delta <= Decimal::ZERO {
            return;
        }

        if text.to_lowercase().contains("igst") {
            parsed.insert(keys::IGST, delta.to_string(), DERIVED_CONFIDENCE);
        } else {
            let half = (delta / Decimal::TWO).round_dp(2);
            parsed.insert(keys::CGST, half.to_string(), DERIVED_CONFIDENCE);
            parsed.insert(keys::SGST, (delta - half).to_string(), DERIVED_CONFIDENCE);
        }
        parsed.flag(keys::TAX_INFERRED, true);

        debug!("Inferred tax components from delta {}", delta);
    }
}

impl Default for InvoiceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for InvoiceParser {
    fn parse(&self, text: &str) -> ParsedFields {
        info!("Parsing invoice from {} characters of text", text.len());
        let mut parsed = ParsedFields::new();

        put_string(&mut parsed, keys::INVOICE_NUMBER, first_capture(&INVOICE_NUMBER, text));
        self.extract_dates(text, &mut parsed);
        self.extract_parties(text, &mut parsed);
        self.extract_amounts(text, &mut parsed);

        let (items, items_confidence) = self.extract_line_items(text);
        if !items.is_empty() {
            if !parsed.contains(keys::SUBTOTAL) {
                let amounts: Option<Vec<Decimal>> = items.iter().map(|i| i.amount).collect();
                if let Some(amounts) = amounts {
                    let sum: Decimal = amounts.into_iter().sum();
                    parsed.insert(keys::SUBTOTAL, sum.to_string(), DERIVED_CONFIDENCE);
                }
            }
            let values: Vec<Value> = items.iter().map(line_value).collect();
            parsed.insert(keys::LINE_ITEMS, Value::Array(values), items_confidence);
        }

        if self.infer_tax {
            self.infer_tax_components(text, &mut parsed);
        }

        if let Some(supply) = SUPPLY_TYPE
            .captures(text)
            .and_then(|c| SupplyType::parse(&c[1]))
        {
            parsed.insert(keys::SUPPLY_TYPE, supply.as_str(), LABELED_CONFIDENCE);
        }
        if let Some(kind) = INVOICE_KIND
            .captures(text)
            .and_then(|c| InvoiceKind::parse(&c[1]))
        {
            parsed.insert(keys::INVOICE_KIND, kind.as_str(), LABELED_CONFIDENCE);
        }

        debug!(
            "Invoice parser found {} fields, {} line items",
            parsed.len(),
            items.len()
        );
        parsed
    }
}

/// Split the text into seller and buyer regions by their section headers.
fn split_sections(text: &str) -> (Option<&str>, Option<&str>) {
    let seller_pos = SELLER_SECTION.find(text).map(|m| m.start());
    let buyer_pos = BUYER_SECTION.find(text).map(|m| m.start());

    match (seller_pos, buyer_pos) {
        (Some(s), Some(b)) if s < b => (Some(&text[s..b]), Some(&text[b..])),
        (Some(s), Some(b)) => (Some(&text[s..]), Some(&text[b..s])),
        (Some(s), None) => (Some(&text[s..]), None),
        (None, Some(b)) => (None, Some(&text[b..])),
        (None, None) => (None, None),
    }
}

fn is_name_candidate(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.len() <= 80
        && line.chars().next().is_some_and(|c| c.is_alphabetic())
        && !line.contains(':')
        && !GSTIN_STANDALONE.is_match(line)
        && !DOCUMENT_TITLE.is_match(line)
        && !TABLE_HEADER.iter().any(|re| re.is_match(line))
}

/// Party name: the rest of the header line, else the first plain line after it.
fn party_name(section: &str, header: &Regex) -> Option<ExtractionMatch<String>> {
    let caps = header.captures(section)?;
    let whole = caps.get(0)?;

    if let Some(rest) = caps.get(1) {
        let name = clean_name(rest.as_str());
        if is_name_candidate(&name) {
            return Some(ExtractionMatch::new(name, LABELED_CONFIDENCE, rest.as_str()));
        }
    }

    section[whole.end()..]
        .lines()
        .map(str::trim)
        .find(|line| is_name_candidate(line))
        .map(|line| ExtractionMatch::new(clean_name(line), FALLBACK_CONFIDENCE, line))
}

/// Without a seller header, the letterhead is usually the first plain line.
fn heading_name(text: &str) -> Option<ExtractionMatch<String>> {
    text.lines()
        .map(str::trim)
        .take(8)
        .find(|line| is_name_candidate(line) && !line.to_lowercase().contains("invoice"))
        .map(|line| ExtractionMatch::new(clean_name(line), STANDALONE_CONFIDENCE, line))
}

/// Rows between a table header and the first totals line.
fn table_items(text: &str) -> Vec<InvoiceLine> {
    let mut items = Vec::new();
    let mut in_table = false;

    for line in text.lines() {
        let line = line.trim();

        if !in_table {
            in_table = TABLE_HEADER.iter().any(|re| re.is_match(line));
            continue;
        }
        if TABLE_END.is_match(line) {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(item) = parse_row(line) {
            items.push(item);
        }
    }

    items
}

/// Parse one table row; the last two numeric columns are rate and amount.
fn parse_row(line: &str) -> Option<InvoiceLine> {
    let columns: Vec<&str> = COLUMN_SPLIT
        .split(line)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let numeric: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| NUMERIC_COLUMN.is_match(c) && !c.ends_with('%'))
        .map(|(i, _)| i)
        .collect();
    if numeric.len() < 2 {
        return None;
    }

    let amount_idx = numeric[numeric.len() - 1];
    let rate_idx = numeric[numeric.len() - 2];

    let hsn_idx = columns
        .iter()
        .enumerate()
        .find(|(i, c)| *i != rate_idx && *i != amount_idx && HSN_COLUMN.is_match(c))
        .map(|(i, _)| i);

    let quantity = rate_idx
        .checked_sub(1)
        .filter(|i| numeric.contains(i) && Some(*i) != hsn_idx)
        .and_then(|i| parse_indian_amount(columns[i]));

    let description = columns
        .iter()
        .filter(|c| !NUMERIC_COLUMN.is_match(c) && c.chars().any(char::is_alphabetic))
        .max_by_key(|c| c.len())?;

    Some(InvoiceLine {
        description: description.to_string(),
        hsn_code: hsn_idx.map(|i| columns[i].to_string()),
        quantity,
        rate: parse_indian_amount(columns[rate_idx]),
        amount: parse_indian_amount(columns[amount_idx]),
    })
}

/// `description qty rate amount` lines anywhere in the text.
fn inline_items(text: &str) -> Vec<InvoiceLine> {
    text.lines()
        .filter(|line| !TABLE_END.is_match(line))
        .filter_map(|line| INLINE_ITEM.captures(line))
        .map(|caps| InvoiceLine {
            description: caps[1].trim().to_string(),
            hsn_code: None,
            quantity: parse_indian_amount(&caps[2]),
            rate: parse_indian_amount(&caps[3]),
            amount: parse_indian_amount(&caps[4]),
        })
        .collect()
}

fn line_value(line: &InvoiceLine) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("description".to_string(), line.description.clone().into());
    if let Some(code) = &line.hsn_code {
        obj.insert("hsn_code".to_string(), code.clone().into());
    }
    for (key, value) in [
        ("quantity", line.quantity),
        ("rate", line.rate),
        ("amount", line.amount),
    ] {
        if let Some(v) = value {
            obj.insert(key.to_string(), v.to_string().into());
        }
    }
    Value::Object(obj)
}
