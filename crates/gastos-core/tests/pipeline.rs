//! End-to-end runs of the ingestion pipeline with canned OCR and model answers.

use std::io::Cursor;
use std::str::FromStr;

use chrono::NaiveDate;
use gastos_core::error::OcrError;
use gastos_core::{
    Analysis, Category, DocumentKind, GastosConfig, InputError, Ingestion, InvoicePipeline,
    MockCompletionClient, OcrBackend, PipelineError, RawDocument, ResponseNormalizer,
    SqliteInvoiceStore,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

struct FixedOcr(&'static str);

impl OcrBackend for FixedOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

type TestPipeline = InvoicePipeline<FixedOcr, MockCompletionClient, SqliteInvoiceStore>;

fn pipeline(ocr_text: &'static str, answer: &str) -> TestPipeline {
    InvoicePipeline::new(
        &GastosConfig::default(),
        FixedOcr(ocr_text),
        MockCompletionClient::new(answer),
        SqliteInvoiceStore::open_in_memory().unwrap(),
    )
    .with_normalizer(
        ResponseNormalizer::default()
            .with_reference_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()),
    )
}

fn encoded(format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(16, 16))
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

const CARREFOUR_OCR: &str = "CARREFOUR   EXPRESS\nFecha: 12/09/2024\nPan 250,00\nTOTAL $4.532,40";

const CARREFOUR_ANSWER: &str = r#"```json
{
  "proveedor": "Carrefour",
  "fecha": "12/09/2024",
  "total": "4.532,40",
  "items": [{"nombre": "Pan", "precio": 250}, {"precio": "1.200,50"}],
  "categoria": "supermercado"
}
```"#;

const TRANSFER_OCR: &str = "Banco Santander\nTitular cuenta destino: Cons Ed Mistica Calle 7 Num 39\nImporte debitado: 14691,00\nFecha 05/02/2025";

#[test]
fn test_invoice_photo_end_to_end() {
    let p = pipeline(CARREFOUR_OCR, CARREFOUR_ANSWER);
    let document = RawDocument::new(encoded(ImageFormat::Png), "ticket.png");

    let Ingestion::Registered { invoice_id, record } = p.ingest(&document).unwrap() else {
        panic!("expected a new registration");
    };

    assert_eq!(record.vendor, "Carrefour");
    assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 9, 12));
    assert_eq!(record.total, dec("4532.40"));
    assert_eq!(record.category, Category::Groceries);
    assert_eq!(record.items.len(), 2);
    assert_eq!(record.items[1].description, "Sin descripción");
    assert_eq!(record.items[1].price, dec("1200.50"));
    assert_eq!(p.store().items(invoice_id).unwrap().len(), 2);

    let prompts = p.client().prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].kind, DocumentKind::Invoice);
    assert!(prompts[0].text.contains("CARREFOUR EXPRESS Fecha: 12/09/2024"));
    let image = prompts[0].image.as_ref().unwrap();
    assert_eq!(image.mime_type, "image/png");
}

#[test]
fn test_jpeg_prompt_carries_image() {
    let p = pipeline(CARREFOUR_OCR, CARREFOUR_ANSWER);
    p.analyze(&RawDocument::new(encoded(ImageFormat::Jpeg), "ticket.jpeg"))
        .unwrap();

    let prompts = p.client().prompts();
    assert!(prompts[0].image.as_ref().unwrap().data_url().starts_with("data:image/jpeg;base64,"));
}

#[test]
fn test_transfer_end_to_end() {
    let answer = r#"{"proveedor": "Cons Ed Mistica Calle 7 Num 39", "fecha": "05/02/2025", "total": 14691, "items": [], "categoria": "Otros"}"#;
    let p = pipeline(TRANSFER_OCR, answer);

    let Ingestion::Registered { record, .. } = p
        .ingest(&RawDocument::new(encoded(ImageFormat::Png), "transferencia.png"))
        .unwrap()
    else {
        panic!("expected a new registration");
    };

    assert_eq!(record.vendor, "Cons Ed Mistica Calle 7 Num 39");
    assert_eq!(record.category, Category::BuildingExpenses);
    assert_eq!(record.total, dec("146910"));
    assert_eq!(record.items.len(), 1);
    assert_eq!(record.items[0].description, "Transferencia bancaria");
    assert_eq!(record.items[0].price, dec("146910"));
    assert_eq!(p.client().prompts()[0].kind, DocumentKind::BankTransfer);
}

#[test]
fn test_bank_as_recipient_is_not_persisted() {
    let answer = r#"{"proveedor": "Santander", "fecha": "05/02/2025", "total": 146910, "categoria": "Otros"}"#;
    let p = pipeline(TRANSFER_OCR, answer);

    let outcome = p.ingest(&RawDocument::new(encoded(ImageFormat::Png), "transferencia.png"));
    assert!(matches!(
        outcome,
        Err(PipelineError::ResubmissionRequired { ref vendor }) if vendor == "Santander"
    ));
    assert_eq!(p.store().invoice_count().unwrap(), 0);
}

#[test]
fn test_second_submission_is_duplicate() {
    let p = pipeline(CARREFOUR_OCR, CARREFOUR_ANSWER);
    let document = RawDocument::new(encoded(ImageFormat::Png), "ticket.png");

    let Ingestion::Registered { invoice_id, .. } = p.ingest(&document).unwrap() else {
        panic!("expected a new registration");
    };
    let Ingestion::AlreadyRegistered { existing_id, record } = p.ingest(&document).unwrap() else {
        panic!("expected a duplicate");
    };

    assert_eq!(existing_id, invoice_id);
    assert_eq!(record.vendor, "Carrefour");
    assert_eq!(p.store().invoice_count().unwrap(), 1);
}

#[test]
fn test_future_date_is_cleared() {
    let answer = r#"{"proveedor": "Farmacity", "fecha": "2031-01-01", "total": 1500, "categoria": "Farmacia"}"#;
    let p = pipeline("FARMACITY", answer);

    let analysis = p
        .analyze(&RawDocument::new(encoded(ImageFormat::Png), "farmacia.png"))
        .unwrap();

    let Analysis::Parsed { record, .. } = &analysis else {
        panic!("expected a parsed record");
    };
    assert_eq!(record.date, None);
    assert_eq!(record.category, Category::Pharmacy);
    assert_eq!(analysis.to_json()["fecha"], "");
}

#[test]
fn test_malformed_answer_is_returned_raw() {
    let p = pipeline(CARREFOUR_OCR, "No pude leer la factura.");

    let analysis = p
        .analyze(&RawDocument::new(encoded(ImageFormat::Png), "ticket.png"))
        .unwrap();
    assert_eq!(
        analysis.to_json(),
        serde_json::json!({"raw_response": "No pude leer la factura."})
    );
}

#[test]
fn test_broken_pdf_has_no_legible_text() {
    let p = pipeline(CARREFOUR_OCR, CARREFOUR_ANSWER);

    let outcome = p.analyze(&RawDocument::new(b"%PDF-1.7\n%%EOF".to_vec(), "resumen.pdf"));
    assert!(matches!(outcome, Err(PipelineError::NoLegibleText)));
    assert!(p.client().prompts().is_empty());
}

#[test]
fn test_rejected_inputs() {
    let p = pipeline(CARREFOUR_OCR, CARREFOUR_ANSWER);

    assert!(matches!(
        p.analyze(&RawDocument::new(b"GIF89a".to_vec(), "animacion.gif")),
        Err(PipelineError::Input(InputError::UnsupportedFormat(_)))
    ));
    assert!(matches!(
        p.analyze(&RawDocument::new(Vec::new(), "ticket.png")),
        Err(PipelineError::Input(InputError::EmptyFile))
    ));
}

#[test]
fn test_missing_vendor_is_incomplete() {
    let p = pipeline(CARREFOUR_OCR, r#"{"proveedor": "", "total": 10}"#);

    assert!(matches!(
        p.analyze(&RawDocument::new(encoded(ImageFormat::Png), "ticket.png")),
        Err(PipelineError::IncompleteResponse(_))
    ));
}
