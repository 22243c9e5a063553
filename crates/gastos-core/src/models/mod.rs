//! Data models for documents, records and configuration.

pub mod config;
pub mod document;
pub mod record;

pub use config::{
    GastosConfig, KeywordRule, KnownRecipient, LlmConfig, MagnitudeCorrection, OcrConfig,
    PdfConfig, RuleTables, ServerConfig, StoreConfig,
};
pub use document::{RawDocument, SourceKind};
pub use record::{Category, DocumentKind, InvoiceRecord, LineItem, wire_date};
