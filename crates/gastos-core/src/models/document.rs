//! Submitted documents.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::InputError;

/// Source format, decided from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Jpeg,
    Png,
    Pdf,
}

impl SourceKind {
    /// Map a filename to its source kind. Only jpg, jpeg, png and pdf are accepted.
    pub fn from_filename(filename: &str) -> Result<Self, InputError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| InputError::UnsupportedFormat(filename.to_string()))?;

        match extension.as_str() {
            "jpg" | "jpeg" => Ok(SourceKind::Jpeg),
            "png" => Ok(SourceKind::Png),
            "pdf" => Ok(SourceKind::Pdf),
            _ => Err(InputError::UnsupportedFormat(filename.to_string())),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            SourceKind::Jpeg => "image/jpeg",
            SourceKind::Png => "image/png",
            SourceKind::Pdf => "application/pdf",
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, SourceKind::Pdf)
    }
}

/// Raw bytes of one submitted document plus its declared filename.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    /// Decode the `{ "data": <base64>, "filename": ... }` envelope payload.
    pub fn from_base64(data: &str, filename: impl Into<String>) -> Result<Self, InputError> {
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| InputError::InvalidEncoding(e.to_string()))?;
        Ok(Self::new(bytes, filename))
    }

    /// Read a document from disk, keeping its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { bytes, filename })
    }

    /// Reject empty payloads and unsupported extensions.
    pub fn validate(&self) -> Result<SourceKind, InputError> {
        if self.bytes.is_empty() {
            return Err(InputError::EmptyFile);
        }
        SourceKind::from_filename(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_filename() {
        assert_eq!(SourceKind::from_filename("factura.JPG"), Ok(SourceKind::Jpeg));
        assert_eq!(SourceKind::from_filename("scan.jpeg"), Ok(SourceKind::Jpeg));
        assert_eq!(SourceKind::from_filename("ticket.png"), Ok(SourceKind::Png));
        assert_eq!(SourceKind::from_filename("resumen.pdf"), Ok(SourceKind::Pdf));
        assert_eq!(
            SourceKind::from_filename("notas.txt"),
            Err(InputError::UnsupportedFormat("notas.txt".to_string()))
        );
        assert!(SourceKind::from_filename("file").is_err());
    }

    #[test]
    fn test_validate() {
        assert_eq!(RawDocument::new(Vec::new(), "a.pdf").validate(), Err(InputError::EmptyFile));
        assert_eq!(RawDocument::new(b"%PDF".to_vec(), "a.pdf").validate(), Ok(SourceKind::Pdf));
    }

    #[test]
    fn test_from_base64() {
        let doc = RawDocument::from_base64("JVBERg==", "a.pdf").unwrap();
        assert_eq!(doc.bytes, b"%PDF");

        assert!(matches!(
            RawDocument::from_base64("not base64!", "a.pdf"),
            Err(InputError::InvalidEncoding(_))
        ));
    }
}
