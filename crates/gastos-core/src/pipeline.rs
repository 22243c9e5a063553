//! One sequential pass from document bytes to a validated, persisted record.

use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::extraction::TextExtractor;
use crate::invoice::rules::collapse_whitespace;
use crate::invoice::{DocumentClassifier, Normalized, PromptBuilder, ResponseNormalizer};
use crate::llm::CompletionClient;
use crate::models::{DocumentKind, GastosConfig, InvoiceRecord, RawDocument, SourceKind};
use crate::ocr::OcrBackend;
use crate::store::{InvoiceStore, Registration};

/// Result of running a document up to normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Parsed {
        record: InvoiceRecord,
        kind: DocumentKind,
    },
    /// The model answer was not JSON; passed through untouched.
    Unparsed { raw: String },
}

impl Analysis {
    /// The JSON contract: the record itself, or `{"raw_response": ...}`.
    pub fn to_json(&self) -> Value {
        match self {
            Analysis::Parsed { record, .. } => serde_json::to_value(record).unwrap_or_else(|e| {
                error!("Failed to serialize record from {}: {}", record.vendor, e);
                json!({})
            }),
            Analysis::Unparsed { raw } => json!({ "raw_response": raw }),
        }
    }
}

/// Result of running a document through persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingestion {
    Registered {
        invoice_id: i64,
        record: InvoiceRecord,
    },
    AlreadyRegistered {
        existing_id: i64,
        record: InvoiceRecord,
    },
    Unparsed {
        raw: String,
    },
}

/// Extractor, classifier, prompt builder, model client, normalizer and store, wired in order.
///
/// Every call owns its own intermediate state; only the store is shared.
pub struct InvoicePipeline<O, C, S> {
    extractor: TextExtractor<O>,
    classifier: DocumentClassifier,
    prompts: PromptBuilder,
    client: C,
    normalizer: ResponseNormalizer,
    store: S,
}

impl<O, C, S> InvoicePipeline<O, C, S>
where
    O: OcrBackend,
    C: CompletionClient,
    S: InvoiceStore,
{
    pub fn new(config: &GastosConfig, ocr: O, client: C, store: S) -> Self {
        Self {
            extractor: TextExtractor::new(ocr, &config.pdf),
            classifier: DocumentClassifier::new(&config.rules),
            prompts: PromptBuilder::new(),
            client,
            normalizer: ResponseNormalizer::new(&config.rules),
            store,
        }
    }

    /// Replace the normalizer, e.g. to pin the reference date.
    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear the pipeline down, handing back the store for closing.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Extract, classify, prompt and normalize. Nothing is persisted.
    pub fn analyze(&self, document: &RawDocument) -> Result<Analysis, PipelineError> {
        let source = document.validate()?;

        let extracted = self.extractor.extract(&document.bytes);
        let text = collapse_whitespace(&extracted.text);
        if text.is_empty() {
            if source == SourceKind::Pdf {
                return Err(PipelineError::NoLegibleText);
            }
            warn!("No OCR text for {:?}, sending image only", document.filename);
        }

        let kind = self.classifier.classify(&text);
        let prompt = self.prompts.build(kind, source, &text, &document.bytes);
        let raw = self.client.complete(&prompt)?;

        match self.normalizer.normalize(&raw, kind)? {
            Normalized::Record(record) => {
                info!(
                    "Analyzed {:?} as {}: {} / {} / {}",
                    document.filename,
                    kind.as_str(),
                    record.vendor,
                    record.date_label(),
                    record.total
                );
                Ok(Analysis::Parsed { record, kind })
            }
            Normalized::Unparsed(raw) => Ok(Analysis::Unparsed { raw }),
        }
    }

    /// Analyze, then register unless an identical record already exists.
    pub fn ingest(&self, document: &RawDocument) -> Result<Ingestion, PipelineError> {
        let (record, kind) = match self.analyze(document)? {
            Analysis::Parsed { record, kind } => (record, kind),
            Analysis::Unparsed { raw } => return Ok(Ingestion::Unparsed { raw }),
        };

        Ok(match self.store.register(&record, kind)? {
            Registration::Registered { invoice_id } => Ingestion::Registered { invoice_id, record },
            Registration::AlreadyRegistered { existing_id } => {
                Ingestion::AlreadyRegistered { existing_id, record }
            }
        })
    }
}
