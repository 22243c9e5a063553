//! Configuration structures for the ingestion pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::record::Category;

/// Main configuration for the gastos pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GastosConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Extraction model configuration.
    pub llm: LlmConfig,

    /// Classification and normalization tables.
    pub rules: RuleTables,

    /// Persistence configuration.
    pub store: StoreConfig,

    /// HTTP service configuration.
    pub server: ServerConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` glyphs in recognized text instead of blanking them.
    pub keep_unknown_glyphs: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unknown_glyphs: false,
        }
    }
}

impl OcrConfig {
    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum trimmed text length to trust the embedded text layer.
    pub min_text_length: usize,

    /// Maximum pages to OCR when the text layer is missing (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 30,
            max_pages: 10,
        }
    }
}

/// Extraction model (chat completion API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

/// A recipient fragment that pins a transfer to a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownRecipient {
    /// Lowercase fragment matched against the recipient name and document text.
    pub fragment: String,

    /// Category assigned when the fragment matches.
    pub category: Category,
}

impl KnownRecipient {
    pub fn new(fragment: &str, category: Category) -> Self {
        Self {
            fragment: fragment.to_string(),
            category,
        }
    }
}

/// Keyword rule applied to transfer recipients, first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub category: Category,
}

/// Correction of transfer totals whose decimal separator was lost or invented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnitudeCorrection {
    pub enabled: bool,

    /// Totals in `[scale_up_from, scale_up_below)` are multiplied by ten.
    pub scale_up_from: Decimal,
    pub scale_up_below: Decimal,

    /// Totals above this are divided by ten.
    pub scale_down_above: Decimal,
}

impl Default for MagnitudeCorrection {
    fn default() -> Self {
        Self {
            enabled: true,
            scale_up_from: Decimal::from(1_000),
            scale_up_below: Decimal::from(100_000),
            scale_down_above: Decimal::from(1_000_000),
        }
    }
}

/// Tables driving classification and transfer normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    /// Phrases that only appear on transfer receipts.
    pub transfer_phrases: Vec<String>,

    /// Bank names. A recipient equal to one of these is rejected.
    pub bank_names: Vec<String>,

    /// Recipients whose category is known up front.
    pub known_recipients: Vec<KnownRecipient>,

    /// Substring rules applied to unknown transfer recipients.
    pub recipient_keywords: Vec<KeywordRule>,

    pub magnitude: MagnitudeCorrection,

    /// Fallback when the model's invoice category is outside the vocabulary.
    pub invoice_default: Category,

    /// Fallback for transfers no rule matched.
    pub transfer_default: Category,

    /// Dates before this year are treated as OCR noise.
    pub min_year: i32,
}

impl Default for RuleTables {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            transfer_phrases: strings(&[
                "comprobante de transferencia",
                "importe debitado",
                "cuenta destino",
                "titular cuenta",
            ]),
            bank_names: strings(&[
                "santander",
                "galicia",
                "bbva",
                "bbva francés",
                "bbva frances",
                "macro",
                "nación",
                "nacion",
                "banco nación",
                "banco nacion",
                "banco provincia",
                "icbc",
                "hsbc",
                "brubank",
                "mercado pago",
            ]),
            known_recipients: vec![
                KnownRecipient::new("cons ed mistica", Category::BuildingExpenses),
                KnownRecipient::new("ed mistica", Category::BuildingExpenses),
            ],
            recipient_keywords: vec![
                KeywordRule {
                    keywords: strings(&["cons", "consorcio", "edificio", "expensas"]),
                    category: Category::BuildingExpenses,
                },
                KeywordRule {
                    keywords: strings(&["alquiler", "inmobiliaria", "propiedades"]),
                    category: Category::Rent,
                },
            ],
            magnitude: MagnitudeCorrection::default(),
            invoice_default: Category::Other,
            transfer_default: Category::Other,
            min_year: 2000,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gastos.db"),
        }
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,

    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl GastosConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
