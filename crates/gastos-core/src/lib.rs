//! Core library for expense document ingestion.
//!
//! This crate provides:
//! - Text extraction from photos and PDFs (text layer, OCR fallback)
//! - Invoice / bank transfer classification and prompt construction
//! - Chat-completion client for structured extraction
//! - Normalization of model output (dates, amounts, categories, transfer rules)
//! - SQLite persistence with vendor upsert and duplicate detection

pub mod error;
pub mod extraction;
pub mod invoice;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod store;

pub use error::{GastosError, InputError, LlmError, PipelineError, Result, StoreError};
pub use extraction::{ExtractedText, ExtractionMethod, TextExtractor};
pub use invoice::rules::parse_wire_date;
pub use invoice::{DocumentClassifier, ExtractionPrompt, Normalized, PromptBuilder, ResponseNormalizer};
pub use llm::{CompletionClient, MockCompletionClient, OpenAiClient};
pub use models::{
    Category, DocumentKind, GastosConfig, InvoiceRecord, LineItem, RawDocument, SourceKind,
};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use ocr::OcrBackend;
pub use pipeline::{Analysis, Ingestion, InvoicePipeline};
pub use store::{InvoiceStore, Registration, SqliteInvoiceStore};
