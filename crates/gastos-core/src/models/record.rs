//! Canonical output of the pipeline and the vocabulary it is expressed in.
//!
//! Field names on the wire are the Spanish keys consumed by the chat front-end
//! (`proveedor`, `fecha`, `total`, `items`, `categoria`).

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of document, decided from its extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Merchant invoice or purchase ticket.
    Invoice,
    /// Bank transfer receipt ("comprobante de transferencia").
    BankTransfer,
}

impl DocumentKind {
    /// Closed category vocabulary accepted for this kind of document.
    pub fn categories(self) -> &'static [Category] {
        match self {
            DocumentKind::Invoice => Category::INVOICE,
            DocumentKind::BankTransfer => Category::TRANSFER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::BankTransfer => "bank_transfer",
        }
    }
}

/// Spending category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Supermercado")]
    Groceries,
    #[serde(rename = "Delivery")]
    Delivery,
    #[serde(rename = "Petshop")]
    PetShop,
    #[serde(rename = "Farmacia")]
    Pharmacy,
    #[serde(rename = "Otros")]
    Other,
    #[serde(rename = "Servicios")]
    Services,
    #[serde(rename = "Alquiler")]
    Rent,
    #[serde(rename = "Expensas")]
    BuildingExpenses,
}

impl Category {
    /// Categories an invoice may carry.
    pub const INVOICE: &'static [Category] = &[
        Category::Groceries,
        Category::Delivery,
        Category::PetShop,
        Category::Pharmacy,
        Category::Other,
        Category::Services,
        Category::Rent,
        Category::BuildingExpenses,
    ];

    /// Categories a bank transfer may carry.
    pub const TRANSFER: &'static [Category] =
        &[Category::Rent, Category::BuildingExpenses, Category::Other];

    /// Wire label, as stored and shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Category::Groceries => "Supermercado",
            Category::Delivery => "Delivery",
            Category::PetShop => "Petshop",
            Category::Pharmacy => "Farmacia",
            Category::Other => "Otros",
            Category::Services => "Servicios",
            Category::Rent => "Alquiler",
            Category::BuildingExpenses => "Expensas",
        }
    }

    /// Match a free-form label produced by the model against `allowed`.
    ///
    /// Exact (case-insensitive) matches win; otherwise a label that contains
    /// a canonical one is accepted, so "Comida/Supermercado" or
    /// "Delivery (PedidosYa)" still resolve.
    pub fn match_label(raw: &str, allowed: &[Category]) -> Option<Category> {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        allowed
            .iter()
            .copied()
            .find(|c| c.label().to_lowercase() == needle)
            .or_else(|| {
                allowed
                    .iter()
                    .copied()
                    .find(|c| needle.contains(&c.label().to_lowercase()))
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single line of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product or concept description.
    #[serde(rename = "nombre")]
    pub description: String,

    /// Line price.
    #[serde(rename = "precio", with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl LineItem {
    pub fn new(description: impl Into<String>, price: Decimal) -> Self {
        Self {
            description: description.into(),
            price,
        }
    }
}

/// Validated invoice or transfer, ready for the persistence gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Issuer of the invoice, or recipient of the transfer.
    #[serde(rename = "proveedor")]
    pub vendor: String,

    /// Issue date; `None` when no trustworthy date was found.
    #[serde(rename = "fecha", with = "wire_date")]
    pub date: Option<NaiveDate>,

    /// Total amount, never negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,

    /// Line items in document order.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Category from the closed vocabulary of the document kind.
    #[serde(rename = "categoria")]
    pub category: Category,
}

impl InvoiceRecord {
    /// Date as shown on the wire (`DD/MM/YYYY`, or empty).
    pub fn date_label(&self) -> String {
        self.date.map(wire_date::format).unwrap_or_default()
    }
}

/// `Option<NaiveDate>` <-> `"DD/MM/YYYY"` / `""`.
pub mod wire_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%d/%m/%Y";

    pub fn format(date: NaiveDate) -> String {
        date.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&format(*d)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveDate::parse_from_str(text, FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_record_wire_shape() {
        let record = InvoiceRecord {
            vendor: "Carrefour".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 9, 12),
            total: Decimal::from_str("4532.40").unwrap(),
            items: vec![LineItem::new("Pan", Decimal::from_str("250.00").unwrap())],
            category: Category::Groceries,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "proveedor": "Carrefour",
                "fecha": "12/09/2024",
                "total": 4532.4,
                "items": [{"nombre": "Pan", "precio": 250.0}],
                "categoria": "Supermercado"
            })
        );
    }

    #[test]
    fn test_missing_date_is_empty_string() {
        let record = InvoiceRecord {
            vendor: "Farmacity".to_string(),
            date: None,
            total: Decimal::ZERO,
            items: Vec::new(),
            category: Category::Pharmacy,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fecha"], "");

        let back: InvoiceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.date, None);
    }

    #[test]
    fn test_match_label() {
        assert_eq!(
            Category::match_label("supermercado", Category::INVOICE),
            Some(Category::Groceries)
        );
        assert_eq!(
            Category::match_label("Comida/Supermercado", Category::INVOICE),
            Some(Category::Groceries)
        );
        assert_eq!(
            Category::match_label("Delivery (PedidosYa, Rappi)", Category::INVOICE),
            Some(Category::Delivery)
        );
        assert_eq!(Category::match_label("Farmacia", Category::TRANSFER), None);
        assert_eq!(Category::match_label("  ", Category::INVOICE), None);
    }
}
