//! Persistence gate: vendor upsert, duplicate detection and invoice inserts.

mod sqlite;

pub use sqlite::{
    SqliteInvoiceStore, find_duplicate, insert_invoice, insert_items, run_migrations,
    upsert_vendor,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::models::{Category, DocumentKind, InvoiceRecord, LineItem};

/// Invoice row to insert.
#[derive(Debug, Clone)]
pub struct NewInvoice<'a> {
    pub vendor_id: i64,
    pub date: Option<NaiveDate>,
    pub total: Decimal,
    pub category: Category,
    pub kind: DocumentKind,
    /// Normalized record as JSON.
    pub raw_payload: &'a str,
}

/// Outcome of [`InvoiceStore::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered { invoice_id: i64 },
    AlreadyRegistered { existing_id: i64 },
}

/// Storage collaborator behind the pipeline.
pub trait InvoiceStore: Send + Sync {
    /// Idempotent by name.
    fn upsert_vendor(&self, name: &str) -> Result<i64, StoreError>;

    /// Existing invoice with the same dedup key. A `None` date only matches `None`.
    fn find_duplicate(
        &self,
        vendor_id: i64,
        date: Option<NaiveDate>,
        total: Decimal,
    ) -> Result<Option<i64>, StoreError>;

    fn insert_invoice(&self, invoice: &NewInvoice<'_>) -> Result<i64, StoreError>;

    fn insert_items(&self, invoice_id: i64, items: &[LineItem]) -> Result<(), StoreError>;

    /// Upsert, dedup check and inserts as one atomic unit.
    fn register(&self, record: &InvoiceRecord, kind: DocumentKind) -> Result<Registration, StoreError>;
}

impl<T: InvoiceStore + ?Sized> InvoiceStore for std::sync::Arc<T> {
    fn upsert_vendor(&self, name: &str) -> Result<i64, StoreError> {
        (**self).upsert_vendor(name)
    }

    fn find_duplicate(
        &self,
        vendor_id: i64,
        date: Option<NaiveDate>,
        total: Decimal,
    ) -> Result<Option<i64>, StoreError> {
        (**self).find_duplicate(vendor_id, date, total)
    }

    fn insert_invoice(&self, invoice: &NewInvoice<'_>) -> Result<i64, StoreError> {
        (**self).insert_invoice(invoice)
    }

    fn insert_items(&self, invoice_id: i64, items: &[LineItem]) -> Result<(), StoreError> {
        (**self).insert_items(invoice_id, items)
    }

    fn register(&self, record: &InvoiceRecord, kind: DocumentKind) -> Result<Registration, StoreError> {
        (**self).register(record, kind)
    }
}
