//! Error types for the gastos-core library.

use thiserror::Error;

/// Main error type for setup paths (configuration, model loading, storage).
#[derive(Error, Debug)]
pub enum GastosError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Extraction model error.
    #[error("model error: {0}")]
    Llm(#[from] LlmError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Request-level pipeline error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract the text layer.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors raised by the extraction model client.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The service could not be reached.
    #[error("cannot reach extraction service at {0}")]
    Connection(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The service answered with a non-success status.
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Response(String),

    /// No API key available.
    #[error("missing API key (set {0})")]
    MissingApiKey(String),

    /// Any other transport failure.
    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Errors raised by the storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {reason}")]
    Migration { version: i64, reason: String },

    /// The raw payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The connection lock was poisoned by a panicking writer.
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Problems with the submitted document itself. Reported before the pipeline runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// No file was attached to the request.
    #[error("no file provided")]
    MissingFile,

    /// The payload has zero bytes.
    #[error("file is empty")]
    EmptyFile,

    /// The file extension is not one of jpg, jpeg, png, pdf.
    #[error("unsupported file format: {0:?}")]
    UnsupportedFormat(String),

    /// The envelope's base64 payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    InvalidEncoding(String),
}

/// Request-scoped failures of one pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The submitted document was rejected before processing.
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// No legible text could be extracted from a PDF.
    #[error("could not extract text from document")]
    NoLegibleText,

    /// The extraction model could not be reached or failed.
    #[error("extraction service unavailable: {0}")]
    ServiceUnavailable(#[from] LlmError),

    /// The model answered with JSON that lacks a required field.
    #[error("incomplete model response: missing {0}")]
    IncompleteResponse(String),

    /// The model named the payer's bank as recipient; the document must be resubmitted.
    #[error("bank name {vendor:?} returned as transfer recipient, resubmission required")]
    ResubmissionRequired { vendor: String },

    /// Persisting the record failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Result type for the gastos library.
pub type Result<T> = std::result::Result<T, GastosError>;
