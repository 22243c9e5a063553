//! Turns raw model text into a validated [`InvoiceRecord`].
//!
//! Model output is untrusted: it may be fenced, wrapped in prose, carry
//! today's date as a fallback, or format totals with local separators.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::rules::patterns::{FENCE_CLOSE, FENCE_OPEN};
use super::rules::{
    DateExtractor, DateWindow, FieldExtractor, RecipientRules, amount_from_json, invoice_category,
    is_bank_name, parse_date,
};
use crate::error::PipelineError;
use crate::models::{Category, DocumentKind, InvoiceRecord, LineItem, MagnitudeCorrection, RuleTables};

/// Description used for items the model left unnamed.
pub const UNNAMED_ITEM: &str = "Sin descripción";

/// Description of the single line item of a transfer.
pub const TRANSFER_ITEM: &str = "Transferencia bancaria";

/// Outcome of normalizing one model answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A validated record.
    Record(InvoiceRecord),
    /// The answer was not a JSON object; the raw text is passed through.
    Unparsed(String),
}

/// Normalizes model answers against a reference day.
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    bank_names: Vec<String>,
    recipients: RecipientRules,
    magnitude: MagnitudeCorrection,
    invoice_default: Category,
    min_year: i32,
    reference_date: Option<NaiveDate>,
}

impl ResponseNormalizer {
    pub fn new(tables: &RuleTables) -> Self {
        Self {
            bank_names: tables.bank_names.clone(),
            recipients: RecipientRules::from_tables(tables),
            magnitude: tables.magnitude.clone(),
            invoice_default: tables.invoice_default,
            min_year: tables.min_year,
            reference_date: None,
        }
    }

    /// Pin "today" instead of reading the local clock on every call.
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.reference_date = Some(today);
        self
    }

    fn window(&self) -> DateWindow {
        let today = self
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        DateWindow::new(today, self.min_year)
    }

    pub fn normalize(&self, raw: &str, kind: DocumentKind) -> Result<Normalized, PipelineError> {
        let Some(fields) = parse_object(raw) else {
            warn!("Model output is not a JSON object, returning raw response");
            return Ok(Normalized::Unparsed(raw.to_string()));
        };

        let vendor = fields
            .get("proveedor")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PipelineError::IncompleteResponse("proveedor".to_string()))?
            .to_string();

        let date = self.sanitize_date(fields.get("fecha"));
        if date.is_none() {
            info!("No valid date detected for {:?}", vendor);
        }

        let total = fields
            .get("total")
            .and_then(amount_from_json)
            .unwrap_or(Decimal::ZERO);

        let label = fields.get("categoria").and_then(Value::as_str);

        let record = match kind {
            DocumentKind::Invoice => InvoiceRecord {
                items: parse_items(fields.get("items")),
                category: invoice_category(label, self.invoice_default),
                vendor,
                date,
                total,
            },
            DocumentKind::BankTransfer => self.finish_transfer(vendor, date, total, label)?,
        };

        Ok(Normalized::Record(record))
    }

    /// Run the three date passes and return the surviving date, if any.
    fn sanitize_date(&self, value: Option<&Value>) -> Option<NaiveDate> {
        let window = self.window();

        let text = match value {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            return None;
        }

        // The whole string parses and is today or later
        if let Some(date) = parse_date(&text) {
            if window.is_not_past(date) {
                info!("Cleared date {:?}: on or after {}", text, window.today);
                return None;
            }
        }

        let Some(date) = DateExtractor::new().extract(&text) else {
            debug!("Cleared date {:?}: no recognizable date", text);
            return None;
        };
        if !window.accepts(date) {
            info!("Cleared date {:?}: outside {}..{}", text, window.min_year, window.today);
            return None;
        }

        // Re-check the normalized value
        if window.is_not_past(date) {
            info!("Cleared date {} after normalization", date);
            return None;
        }

        Some(date)
    }

    fn finish_transfer(
        &self,
        vendor: String,
        date: Option<NaiveDate>,
        total: Decimal,
        label: Option<&str>,
    ) -> Result<InvoiceRecord, PipelineError> {
        if is_bank_name(&vendor, &self.bank_names) {
            warn!("Model returned bank {:?} as transfer recipient", vendor);
            return Err(PipelineError::ResubmissionRequired { vendor });
        }

        let (category, source) = self.recipients.categorize(&vendor, label);
        debug!("Transfer to {:?} categorized as {} ({:?})", vendor, category, source);

        let total = match self.magnitude.correct(total) {
            Some(corrected) => {
                info!("Corrected transfer total {} -> {}", total, corrected);
                corrected
            }
            None => total,
        };

        Ok(InvoiceRecord {
            items: vec![LineItem::new(TRANSFER_ITEM, total)],
            vendor,
            date,
            total,
            category,
        })
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new(&RuleTables::default())
    }
}

/// Remove a leading ```lang line and a trailing ``` fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(m) = FENCE_OPEN.find(text) {
        text = &text[m.end()..];
    }
    if let Some(m) = FENCE_CLOSE.find(text) {
        text = &text[..m.start()];
    }
    text.trim()
}

/// Parse a JSON object out of model text, tolerating fences and surrounding prose.
pub fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let clean = strip_code_fences(raw);

    let value = serde_json::from_str::<Value>(clean).ok().or_else(|| {
        let start = clean.find('{')?;
        let end = clean.rfind('}')?;
        (start < end)
            .then(|| serde_json::from_str::<Value>(&clean[start..=end]).ok())
            .flatten()
    })?;

    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn parse_items(value: Option<&Value>) -> Vec<LineItem> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let item = item.as_object()?;
            let description = item
                .get("nombre")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(UNNAMED_ITEM);
            let price = item
                .get("precio")
                .and_then(amount_from_json)
                .unwrap_or(Decimal::ZERO);
            Some(LineItem::new(description, price))
        })
        .collect()
}
