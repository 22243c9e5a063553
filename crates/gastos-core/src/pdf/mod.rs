//! PDF processing module.

mod extractor;

#[cfg(test)]
pub(crate) mod fixtures;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Magic header every PDF starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// True when `data` starts with the PDF magic header.
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the text layer, one entry per page.
    fn extract_page_texts(&self) -> Result<Vec<String>>;

    /// Extract the raster images placed on a page (1-indexed).
    fn extract_images(&self, page: u32) -> Result<Vec<DynamicImage>>;
}
