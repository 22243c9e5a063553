//! Prompt construction for the extraction model.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::models::{DocumentKind, SourceKind};

/// System instruction fixing the output to structured JSON.
pub const SYSTEM_INSTRUCTION: &str = "Eres un analizador de facturas que devuelve JSON estructurado.";

const INVOICE_TEMPLATE: &str = r#"Analiza cuidadosamente la siguiente factura y devuelve los campos solicitados en formato JSON.

Tu tarea es **extraer información REAL del documento, no inventarla**.
Si algún dato no aparece, debes dejar el campo vacío o null.

Campos requeridos:
- **proveedor**: nombre de la empresa o comercio emisor.
- **fecha**: la fecha de emisión de la factura (NO inventar ni usar la actual).
- **total**: el importe total (buscar palabras como 'TOTAL', 'TOTAL FINAL', 'IMPORTE A PAGAR', 'TOTAL FACTURA').
- **items**: lista de productos o conceptos, con nombre y precio (si están visibles).
- **categoria**: clasifica en una de estas:
  1. Supermercado
  2. Delivery (PedidosYa, Rappi)
  3. Petshop
  4. Farmacia
  5. Otros
  6. Servicios
  7. Alquiler
  8. Expensas

REGLAS IMPORTANTES:
- **No uses la fecha del día actual bajo ningún motivo.**
- **Si no estás seguro de la fecha, deja `"fecha": ""`.**
- Usa solo la fecha que esté junto a palabras como "Fecha", "Emisión", "Factura", "Fecha de compra".
- Ignora fechas de vencimiento o entrega.
- Devuelve **solo JSON válido**, sin texto adicional.
- Para el campo "total", prioriza el número junto a palabras como "TOTAL", "TOTAL A PAGAR" o "IMPORTE FINAL".
- Si el documento no tiene texto legible o el total no se entiende, deja el valor en cero.

Ejemplo de salida válida:
{
  "proveedor": "Carrefour",
  "fecha": "12/09/2024",
  "total": 4532.40,
  "items": [{"nombre": "Pan", "precio": 250.00}],
  "categoria": "Supermercado"
}
"#;

const TRANSFER_TEMPLATE: &str = r#"Analiza cuidadosamente el siguiente comprobante de transferencia bancaria y devuelve los campos solicitados en formato JSON.

Tu tarea es **extraer información REAL del documento, no inventarla**.
Si algún dato no aparece, debes dejar el campo vacío o null.

Campos requeridos:
- **proveedor**: el destinatario de la transferencia, es decir el titular de la cuenta destino (persona, consorcio o empresa que recibe el dinero).
- **fecha**: la fecha en que se realizó la transferencia (NO inventar ni usar la actual).
- **total**: el importe transferido (buscar palabras como 'IMPORTE', 'IMPORTE DEBITADO', 'MONTO').
- **items**: un único ítem {"nombre": "Transferencia bancaria", "precio": <total>}.
- **categoria**: clasifica en una de estas:
  1. Alquiler (inmobiliarias, propietarios, alquileres)
  2. Expensas (consorcios, edificios, administraciones)
  3. Otros

REGLAS IMPORTANTES:
- **El proveedor NUNCA es un banco.** Ignora nombres como Santander, Galicia, BBVA, Macro, Nación, Provincia, ICBC, HSBC, Brubank o Mercado Pago: son el banco emisor, no el destinatario.
- Usa el nombre que aparece junto a "Titular cuenta destino", "Destinatario" o "Beneficiario".
- Si el destinatario es un consorcio o edificio ("Cons", "Consorcio", "Edificio"), la categoría es Expensas.
- Si el destinatario es una inmobiliaria o el pago es de un alquiler, la categoría es Alquiler.
- En cualquier otro caso usa Otros.
- **No uses la fecha del día actual bajo ningún motivo.** Si no estás seguro, deja `"fecha": ""`.
- Devuelve **solo JSON válido**, sin texto adicional.

Ejemplo de salida válida:
{
  "proveedor": "Cons Ed Mistica Calle 7 Num 39",
  "fecha": "05/08/2024",
  "total": 146910.00,
  "items": [{"nombre": "Transferencia bancaria", "precio": 146910.00}],
  "categoria": "Expensas"
}
"#;

/// Image attached inline to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: &'static str,
    /// Base64 payload, without the data-URL prefix.
    pub data: String,
}

impl InlineImage {
    pub fn new(mime_type: &'static str, bytes: &[u8]) -> Self {
        Self {
            mime_type,
            data: STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Instruction payload for one extraction call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt {
    pub system: &'static str,
    pub text: String,
    pub image: Option<InlineImage>,
    pub kind: DocumentKind,
}

/// Builds the per-kind prompt from extracted text and, for images, the raw bytes.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn template(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Invoice => INVOICE_TEMPLATE,
            DocumentKind::BankTransfer => TRANSFER_TEMPLATE,
        }
    }

    pub fn build(
        &self,
        kind: DocumentKind,
        source: SourceKind,
        text: &str,
        bytes: &[u8],
    ) -> ExtractionPrompt {
        let template = Self::template(kind);

        let (text, image) = if source.is_image() {
            (
                format!("{}\n\nTexto OCR extraído:\n{}", template, text),
                Some(InlineImage::new(source.mime_type(), bytes)),
            )
        } else {
            let label = match kind {
                DocumentKind::Invoice => "Texto de la factura:",
                DocumentKind::BankTransfer => "Texto del comprobante:",
            };
            (format!("{}\n\n{}\n{}", template, label, text), None)
        };

        debug!(
            "Built {} prompt ({} chars, image: {})",
            kind.as_str(),
            text.len(),
            image.is_some()
        );

        ExtractionPrompt {
            system: SYSTEM_INSTRUCTION,
            text,
            image,
            kind,
        }
    }
}
