//! Raw document bytes to plain text.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::models::PdfConfig;
use crate::ocr::OcrBackend;
use crate::pdf::{PdfExtractor, PdfProcessor, is_pdf};

/// How the text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Embedded text layer of a PDF.
    TextLayer,
    /// OCR over the raster images of a PDF.
    PdfOcr,
    /// OCR over an image file.
    ImageOcr,
}

/// Text produced by the extractor. Empty text signals failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
}

impl ExtractedText {
    fn new(text: impl AsRef<str>, method: ExtractionMethod) -> Self {
        Self {
            text: text.as_ref().trim().to_string(),
            method,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Picks the text layer or OCR per document and never fails: errors become empty text.
pub struct TextExtractor<O> {
    ocr: O,
    min_text_length: usize,
    max_pages: usize,
}

impl<O: OcrBackend> TextExtractor<O> {
    pub fn new(ocr: O, config: &PdfConfig) -> Self {
        Self {
            ocr,
            min_text_length: config.min_text_length,
            max_pages: config.max_pages,
        }
    }

    pub fn ocr(&self) -> &O {
        &self.ocr
    }

    /// Extract trimmed text; `%PDF` bytes are PDFs, anything else is an image.
    pub fn extract(&self, bytes: &[u8]) -> ExtractedText {
        let start = Instant::now();

        let extracted = if is_pdf(bytes) {
            self.extract_pdf(bytes)
        } else {
            ExtractedText::new(self.extract_image(bytes), ExtractionMethod::ImageOcr)
        };

        info!(
            "Extracted {} chars via {:?} in {}ms",
            extracted.text.chars().count(),
            extracted.method,
            start.elapsed().as_millis()
        );
        extracted
    }

    fn extract_pdf(&self, bytes: &[u8]) -> ExtractedText {
        let pdf = match PdfExtractor::from_bytes(bytes) {
            Ok(pdf) => pdf,
            Err(e) => {
                warn!("Could not open PDF: {}", e);
                return ExtractedText::new("", ExtractionMethod::TextLayer);
            }
        };

        let layer = match pdf.extract_page_texts() {
            Ok(pages) => pages.join("\n"),
            Err(e) => {
                warn!("Text layer extraction failed: {}", e);
                String::new()
            }
        };
        let layer = ExtractedText::new(layer, ExtractionMethod::TextLayer);

        let length = layer.text.chars().count();
        if length >= self.min_text_length {
            return layer;
        }

        debug!(
            "Text layer too short ({} < {} chars), falling back to OCR",
            length, self.min_text_length
        );

        let scanned = ExtractedText::new(self.ocr_pdf_pages(&pdf), ExtractionMethod::PdfOcr);
        if scanned.is_empty() { layer } else { scanned }
    }

    fn ocr_pdf_pages(&self, pdf: &PdfExtractor) -> String {
        let mut pages = pdf.page_count();
        if self.max_pages > 0 {
            pages = pages.min(self.max_pages as u32);
        }

        let mut text = String::new();
        for page in 1..=pages {
            let images = match pdf.extract_images(page) {
                Ok(images) => images,
                Err(e) => {
                    warn!("Could not read images of page {}: {}", page, e);
                    continue;
                }
            };

            for image in &images {
                match self.ocr.recognize(image) {
                    Ok(page_text) => {
                        text.push_str(&page_text);
                        text.push('\n');
                    }
                    Err(e) => warn!("OCR failed on page {}: {}", page, e),
                }
            }
        }
        text
    }

    fn extract_image(&self, bytes: &[u8]) -> String {
        let image = match image::load_from_memory(bytes) {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not decode image: {}", e);
                return String::new();
            }
        };

        self.ocr.recognize(&image).unwrap_or_else(|e| {
            warn!("OCR failed: {}", e);
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::pdf::fixtures::scanned_pdf;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOcr {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl FixedOcr {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OcrBackend for FixedOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    struct FailingOcr;

    impl OcrBackend for FailingOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Err(OcrError::Recognition("boom".to_string()))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_image_goes_through_ocr() {
        let extractor = TextExtractor::new(FixedOcr::new("  CARREFOUR\nTOTAL $4.532,40 \n"), &PdfConfig::default());

        let extracted = extractor.extract(&png_bytes());
        assert_eq!(extracted.method, ExtractionMethod::ImageOcr);
        assert_eq!(extracted.text, "CARREFOUR\nTOTAL $4.532,40");
    }

    #[test]
    fn test_undecodable_image_is_empty() {
        let extractor = TextExtractor::new(FixedOcr::new("never"), &PdfConfig::default());

        assert!(extractor.extract(b"not an image").is_empty());
        assert_eq!(extractor.ocr().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ocr_failure_is_empty() {
        let extractor = TextExtractor::new(FailingOcr, &PdfConfig::default());
        assert!(extractor.extract(&png_bytes()).is_empty());
    }

    #[test]
    fn test_broken_pdf_is_empty() {
        let extractor = TextExtractor::new(FixedOcr::new("never"), &PdfConfig::default());

        let extracted = extractor.extract(b"%PDF-1.4 truncated");
        assert!(extracted.is_empty());
        assert_eq!(extractor.ocr().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scanned_pdf_falls_back_to_ocr() {
        let extractor = TextExtractor::new(
            FixedOcr::new("COMPROBANTE DE TRANSFERENCIA Importe debitado: 14691,00"),
            &PdfConfig::default(),
        );

        let extracted = extractor.extract(&scanned_pdf());
        assert_eq!(extracted.method, ExtractionMethod::PdfOcr);
        assert!(extracted.text.starts_with("COMPROBANTE DE TRANSFERENCIA"));
        assert_eq!(extractor.ocr().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_pages_zero_means_unlimited() {
        let config = PdfConfig {
            max_pages: 0,
            ..PdfConfig::default()
        };
        let extractor = TextExtractor::new(FixedOcr::new("texto escaneado"), &config);

        assert_eq!(extractor.extract(&scanned_pdf()).text, "texto escaneado");
    }
}
