//! Typed invoice view built from the schema-less field map.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::FieldMap;

/// Field map keys written by the invoice and receipt parsers.
pub mod keys {
    pub const INVOICE_NUMBER: &str = "invoice_number";
    pub const INVOICE_DATE: &str = "invoice_date";
    pub const DUE_DATE: &str = "due_date";
    pub const VENDOR_NAME: &str = "vendor_name";
    pub const VENDOR_GSTIN: &str = "vendor_gstin";
    pub const BUYER_NAME: &str = "buyer_name";
    pub const BUYER_GSTIN: &str = "buyer_gstin";
    pub const PLACE_OF_SUPPLY: &str = "place_of_supply";
    pub const SUBTOTAL: &str = "subtotal";
    pub const CGST: &str = "cgst";
    pub const SGST: &str = "sgst";
    pub const IGST: &str = "igst";
    pub const CESS: &str = "cess";
    pub const ROUND_OFF: &str = "round_off";
    pub const GRAND_TOTAL: &str = "grand_total";
    pub const LINE_ITEMS: &str = "line_items";
    pub const SUPPLY_TYPE: &str = "supply_type";
    pub const INVOICE_KIND: &str = "invoice_kind";
    pub const TAX_INFERRED: &str = "tax_components_inferred";
    pub const PAYMENT_MODE: &str = "payment_mode";
}

/// Registration classification printed on some invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyType {
    /// Registered buyer.
    B2B,
    /// Unregistered buyer.
    B2C,
}

impl SupplyType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "B2B" => Some(SupplyType::B2B),
            "B2C" | "B2CS" | "B2CL" => Some(SupplyType::B2C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupplyType::B2B => "B2B",
            SupplyType::B2C => "B2C",
        }
    }
}

/// Direction of an invoice from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Sales,
    Purchase,
}

impl InvoiceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sales" | "sale" => Some(InvoiceKind::Sales),
            "purchase" | "purchases" => Some(InvoiceKind::Purchase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Sales => "sales",
            InvoiceKind::Purchase => "purchase",
        }
    }
}

/// A single invoice line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    /// HSN (goods) or SAC (services) code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

/// Checked, typed invoice.
///
/// GSTINs stay as raw strings: a malformed identifier is a validation
/// outcome, not a conversion failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub vendor_name: Option<String>,
    pub vendor_gstin: Option<String>,
    pub buyer_name: Option<String>,
    pub buyer_gstin: Option<String>,
    /// Two-digit state code of the place of supply.
    pub place_of_supply: Option<String>,
    pub subtotal: Option<Decimal>,
    pub cgst: Option<Decimal>,
    pub sgst: Option<Decimal>,
    pub igst: Option<Decimal>,
    pub cess: Option<Decimal>,
    pub round_off: Option<Decimal>,
    pub grand_total: Option<Decimal>,
    pub line_items: Vec<InvoiceLine>,
    pub supply_type: Option<SupplyType>,
    pub invoice_kind: Option<InvoiceKind>,
    /// Tax components were derived from `grand_total - subtotal`.
    pub tax_components_inferred: bool,
}

impl InvoiceData {
    /// Convert a raw field map into the typed view.
    ///
    /// Values that fail to parse are treated as absent.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let line_items = fields
            .get(keys::LINE_ITEMS)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(line_from_value).collect())
            .unwrap_or_default();

        Self {
            invoice_number: string_field(fields, keys::INVOICE_NUMBER),
            invoice_date: date_field(fields, keys::INVOICE_DATE),
            due_date: date_field(fields, keys::DUE_DATE),
            vendor_name: string_field(fields, keys::VENDOR_NAME),
            vendor_gstin: string_field(fields, keys::VENDOR_GSTIN).map(|g| g.to_uppercase()),
            buyer_name: string_field(fields, keys::BUYER_NAME),
            buyer_gstin: string_field(fields, keys::BUYER_GSTIN).map(|g| g.to_uppercase()),
            place_of_supply: string_field(fields, keys::PLACE_OF_SUPPLY),
            subtotal: decimal_field(fields, keys::SUBTOTAL),
            cgst: decimal_field(fields, keys::CGST),
            sgst: decimal_field(fields, keys::SGST),
            igst: decimal_field(fields, keys::IGST),
            cess: decimal_field(fields, keys::CESS),
            round_off: decimal_field(fields, keys::ROUND_OFF),
            grand_total: decimal_field(fields, keys::GRAND_TOTAL),
            line_items,
            supply_type: string_field(fields, keys::SUPPLY_TYPE)
                .and_then(|s| SupplyType::parse(&s)),
            invoice_kind: string_field(fields, keys::INVOICE_KIND)
                .and_then(|s| InvoiceKind::parse(&s)),
            tax_components_inferred: fields
                .get(keys::TAX_INFERRED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Convert back into a field map, omitting absent values.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        put_string(&mut fields, keys::INVOICE_NUMBER, &self.invoice_number);
        put_date(&mut fields, keys::INVOICE_DATE, self.invoice_date);
        put_date(&mut fields, keys::DUE_DATE, self.due_date);
        put_string(&mut fields, keys::VENDOR_NAME, &self.vendor_name);
        put_string(&mut fields, keys::VENDOR_GSTIN, &self.vendor_gstin);
        put_string(&mut fields, keys::BUYER_NAME, &self.buyer_name);
        put_string(&mut fields, keys::BUYER_GSTIN, &self.buyer_gstin);
        put_string(&mut fields, keys::PLACE_OF_SUPPLY, &self.place_of_supply);
        put_decimal(&mut fields, keys::SUBTOTAL, self.subtotal);
        put_decimal(&mut fields, keys::CGST, self.cgst);
        put_decimal(&mut fields, keys::SGST, self.sgst);
        put_decimal(&mut fields, keys::IGST, self.igst);
        put_decimal(&mut fields, keys::CESS, self.cess);
        put_decimal(&mut fields, keys::ROUND_OFF, self.round_off);
        put_decimal(&mut fields, keys::GRAND_TOTAL, self.grand_total);

        if !self.line_items.is_empty() {
            let items = self.line_items.iter().map(line_to_value).collect();
            fields.insert(keys::LINE_ITEMS.to_string(), Value::Array(items));
        }
        if let Some(supply) = self.supply_type {
            fields.insert(keys::SUPPLY_TYPE.to_string(), supply.as_str().into());
        }
        if let Some(kind) = self.invoice_kind {
            fields.insert(keys::INVOICE_KIND.to_string(), kind.as_str().into());
        }
        if self.tax_components_inferred {
            fields.insert(keys::TAX_INFERRED.to_string(), Value::Bool(true));
        }
        fields
    }

    /// Sum of all tax components present, treating absent ones as zero.
    pub fn total_tax(&self) -> Decimal {
        [self.cgst, self.sgst, self.igst, self.cess]
            .iter()
            .flatten()
            .copied()
            .sum()
    }

    /// Whether a field is present in the typed view.
    pub fn has_field(&self, key: &str) -> bool {
        match key {
            keys::INVOICE_NUMBER => self.invoice_number.is_some(),
            keys::INVOICE_DATE => self.invoice_date.is_some(),
            keys::DUE_DATE => self.due_date.is_some(),
            keys::VENDOR_NAME => self.vendor_name.is_some(),
            keys::VENDOR_GSTIN => self.vendor_gstin.is_some(),
            keys::BUYER_NAME => self.buyer_name.is_some(),
            keys::BUYER_GSTIN => self.buyer_gstin.is_some(),
            keys::PLACE_OF_SUPPLY => self.place_of_supply.is_some(),
            keys::SUBTOTAL => self.subtotal.is_some(),
            keys::CGST => self.cgst.is_some(),
            keys::SGST => self.sgst.is_some(),
            keys::IGST => self.igst.is_some(),
            keys::CESS => self.cess.is_some(),
            keys::ROUND_OFF => self.round_off.is_some(),
            keys::GRAND_TOTAL => self.grand_total.is_some(),
            keys::LINE_ITEMS => !self.line_items.is_empty(),
            keys::SUPPLY_TYPE => self.supply_type.is_some(),
            keys::INVOICE_KIND => self.invoice_kind.is_some(),
            _ => false,
        }
    }
}

fn string_field(fields: &FieldMap, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn date_field(fields: &FieldMap, key: &str) -> Option<NaiveDate> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Read a decimal stored either as a string or a JSON number.
pub fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn decimal_field(fields: &FieldMap, key: &str) -> Option<Decimal> {
    fields.get(key).and_then(decimal_value)
}

fn line_from_value(value: &Value) -> Option<InvoiceLine> {
    let obj = value.as_object()?;
    Some(InvoiceLine {
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        hsn_code: obj
            .get("hsn_code")
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
        quantity: obj.get("quantity").and_then(decimal_value),
        rate: obj.get("rate").and_then(decimal_value),
        amount: obj.get("amount").and_then(decimal_value),
    })
}

fn line_to_value(line: &InvoiceLine) -> Value {
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

fn put_string(fields: &mut FieldMap, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        fields.insert(key.to_string(), v.clone().into());
    }
}

fn put_date(fields: &mut FieldMap, key: &str, value: Option<NaiveDate>) {
    if let Some(d) = value {
        fields.insert(key.to_string(), d.format("%Y-%m-%d").to_string().into());
    }
}

fn put_decimal(fields: &mut FieldMap, key: &str, value: Option<Decimal>) {
    if let Some(d) = value {
        fields.insert(key.to_string(), d.to_string().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_fields_reads_strings_and_numbers() {
        let mut fields = FieldMap::new();
        fields.insert(keys::SUBTOTAL.to_string(), json!("10000.00"));
        fields.insert(keys::CGST.to_string(), json!(900));
        fields.insert(keys::INVOICE_DATE.to_string(), json!("2024-03-15"));
        fields.insert(keys::VENDOR_GSTIN.to_string(), json!("27aabcu9603r1zm"));

        let invoice = InvoiceData::from_fields(&fields);
        assert_eq!(invoice.subtotal, Some(Decimal::new(1000000, 2)));
        assert_eq!(invoice.cgst, Some(Decimal::from(900)));
        assert_eq!(invoice.invoice_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(invoice.vendor_gstin.as_deref(), Some("27AABCU9603R1ZM"));
        assert!(invoice.igst.is_none());
    }

    #[test]
    fn test_unparseable_values_are_absent() {
        let mut fields = FieldMap::new();
        fields.insert(keys::GRAND_TOTAL.to_string(), json!("twelve"));
        fields.insert(keys::DUE_DATE.to_string(), json!("31/02/2024"));

        let invoice = InvoiceData::from_fields(&fields);
        assert!(invoice.grand_total.is_none());
        assert!(invoice.due_date.is_none());
    }

    #[test]
    fn test_to_fields_omits_missing() {
        let invoice = InvoiceData {
            invoice_number: Some("INV-7".to_string()),
            grand_total: Some(Decimal::from(118)),
            line_items: vec![InvoiceLine {
                description: "Widget".to_string(),
                hsn_code: Some("8471".to_string()),
                quantity: Some(Decimal::ONE),
                rate: Some(Decimal::from(100)),
                amount: Some(Decimal::from(100)),
            }],
            ..Default::default()
        };

        let fields = invoice.to_fields();
        assert!(!fields.contains_key(keys::SUBTOTAL));
        assert_eq!(fields[keys::GRAND_TOTAL], json!("118"));
        assert_eq!(InvoiceData::from_fields(&fields), invoice);
    }

    #[test]
    fn test_total_tax_ignores_absent_components() {
        let invoice = InvoiceData {
            cgst: Some(Decimal::from(90)),
            sgst: Some(Decimal::from(90)),
            ..Default::default()
        };
        assert_eq!(invoice.total_tax(), Decimal::from(180));
    }
}
