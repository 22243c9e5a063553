//! Serve command - HTTP front of the extraction pipeline.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use console::style;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use gastos_core::{InputError, Ingestion, PipelineError, RawDocument, SqliteInvoiceStore};

use super::{LivePipeline, build_pipeline, load_config, shutdown_pipeline};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (defaults to server.bind from the config)
    #[arg(short, long)]
    bind: Option<String>,
}

type SharedPipeline = Arc<LivePipeline>;

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let max_upload_bytes = config.server.max_upload_bytes;

    let pipeline = tokio::task::spawn_blocking(move || -> anyhow::Result<LivePipeline> {
        let store = SqliteInvoiceStore::open(&config.store.path)?;
        build_pipeline(&config, store)
    })
    .await??;
    let pipeline = Arc::new(pipeline);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    println!(
        "{} Listening on http://{}",
        style("✓").green(),
        listener.local_addr()?
    );

    axum::serve(listener, router(pipeline.clone(), max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let pipeline = Arc::try_unwrap(pipeline)
        .map_err(|_| anyhow::anyhow!("Pipeline still in use after shutdown"))?;
    tokio::task::spawn_blocking(move || shutdown_pipeline(pipeline)).await??;
    info!("Store closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Routes of the extraction service.
pub fn router(pipeline: SharedPipeline, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process_document))
        .route("/invoices", post(register_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(pipeline)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn process_document(
    State(pipeline): State<SharedPipeline>,
    Upload(document): Upload,
) -> Result<Json<Value>, ApiError> {
    let analysis = run_blocking(move || pipeline.analyze(&document)).await?;
    Ok(Json(analysis.to_json()))
}

async fn register_document(
    State(pipeline): State<SharedPipeline>,
    Upload(document): Upload,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ingestion = run_blocking(move || pipeline.ingest(&document)).await?;

    Ok(match ingestion {
        Ingestion::Registered { invoice_id, record } => (
            StatusCode::CREATED,
            Json(json!({ "estado": "registrada", "id": invoice_id, "factura": record })),
        ),
        Ingestion::AlreadyRegistered { existing_id, record } => (
            StatusCode::OK,
            Json(json!({ "estado": "duplicada", "id": existing_id, "factura": record })),
        ),
        Ingestion::Unparsed { raw } => (StatusCode::OK, Json(json!({ "raw_response": raw }))),
    })
}

/// Run pipeline work on the blocking pool; OCR and the model call never touch the executor.
async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(outcome) => outcome.map_err(ApiError::from),
        Err(e) => {
            error!("Pipeline task failed: {}", e);
            Err(ApiError::internal())
        }
    }
}

/// `{ "data": <base64>, "filename": <name> }`
#[derive(Deserialize)]
struct Envelope {
    data: Option<String>,
    filename: Option<String>,
}

/// Document taken from a JSON envelope or a multipart `file` field.
struct Upload(RawDocument);

impl<S> FromRequest<S> for Upload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?
            {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("file").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                return Ok(Upload(RawDocument::new(bytes.to_vec(), filename)));
            }

            return Err(InputError::MissingFile.into());
        }

        let Json(envelope) = Json::<Envelope>::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

        let data = envelope.data.ok_or(InputError::MissingFile)?;
        let filename = envelope.filename.unwrap_or_else(|| "file".to_string());
        Ok(Upload(RawDocument::from_base64(&data, filename)?))
    }
}

/// Error body `{ "error": <message> }` with the matching status.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Error interno al procesar el archivo")
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        PipelineError::Input(err).into()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let (status, message) = match &err {
            PipelineError::Input(input) => (StatusCode::BAD_REQUEST, input_message(input)),
            PipelineError::NoLegibleText => (
                StatusCode::BAD_REQUEST,
                "No se pudo extraer texto del PDF".to_string(),
            ),
            PipelineError::ServiceUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "El servicio de extracción no respondió correctamente".to_string(),
            ),
            PipelineError::IncompleteResponse(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "La respuesta del modelo está incompleta".to_string(),
            ),
            PipelineError::ResubmissionRequired { vendor } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "Se detectó el banco {} como destinatario. Reenviá el comprobante con el titular de la cuenta destino visible.",
                    vendor
                ),
            ),
            PipelineError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al registrar la factura".to_string(),
            ),
        };

        if status.is_server_error() {
            error!("Request failed: {}", err);
        } else {
            warn!("Request rejected: {}", err);
        }
        Self::new(status, message)
    }
}

fn input_message(err: &InputError) -> String {
    match err {
        InputError::MissingFile => "No se encontró ningún archivo",
        InputError::EmptyFile => "El archivo está vacío",
        InputError::UnsupportedFormat(_) => "Formato de archivo no soportado",
        InputError::InvalidEncoding(_) => "El archivo no es base64 válido",
    }
    .to_string()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use gastos_core::error::OcrError;
    use gastos_core::{
        CompletionClient, GastosConfig, InvoicePipeline, MockCompletionClient, OcrBackend,
    };
    use image::DynamicImage;
    use tower::ServiceExt;

    struct FixedOcr;

    impl OcrBackend for FixedOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Ok("CARREFOUR TOTAL $4.532,40".to_string())
        }
    }

    const CARREFOUR: &str = r#"{"proveedor": "Carrefour", "fecha": "12/09/2024", "total": 4532.40, "items": [{"nombre": "Pan", "precio": 250}], "categoria": "Supermercado"}"#;

    fn app(answer: &str) -> Router {
        let pipeline: LivePipeline = InvoicePipeline::new(
            &GastosConfig::default(),
            Box::new(FixedOcr) as Box<dyn OcrBackend>,
            Box::new(MockCompletionClient::new(answer)) as Box<dyn CompletionClient>,
            SqliteInvoiceStore::open_in_memory().unwrap(),
        );
        router(Arc::new(pipeline), 1024 * 1024)
    }

    fn envelope(path: &str, data: &[u8], filename: &str) -> Request {
        let body = json!({ "data": STANDARD.encode(data), "filename": filename });
        axum::http::Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(CARREFOUR).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_process_envelope() {
        let response = app(CARREFOUR)
            .oneshot(envelope("/process", b"photo bytes", "ticket.png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["proveedor"], "Carrefour");
        assert_eq!(body["fecha"], "12/09/2024");
        assert_eq!(body["total"], 4532.4);
        assert_eq!(body["categoria"], "Supermercado");
    }

    #[tokio::test]
    async fn test_process_multipart() {
        let boundary = "gastos-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"ticket.jpg\"\r\nContent-Type: image/jpeg\r\n\r\nphoto bytes\r\n--{b}--\r\n",
            b = boundary
        );
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app(CARREFOUR).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["proveedor"], "Carrefour");
    }

    #[tokio::test]
    async fn test_raw_response_fallback() {
        let response = app("no es json")
            .oneshot(envelope("/process", b"photo bytes", "ticket.png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "raw_response": "no es json" }));
    }

    #[tokio::test]
    async fn test_input_errors() {
        let response = app(CARREFOUR)
            .oneshot(envelope("/process", b"GIF89a", "animacion.gif"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Formato de archivo no soportado" })
        );

        let response = app(CARREFOUR)
            .oneshot(envelope("/process", b"", "ticket.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "El archivo está vacío" }));

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/process")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"filename": "ticket.png"}"#))
            .unwrap();
        let response = app(CARREFOUR).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "No se encontró ningún archivo" })
        );
    }

    #[tokio::test]
    async fn test_unreadable_pdf() {
        let response = app(CARREFOUR)
            .oneshot(envelope("/process", b"%PDF-1.4 broken", "resumen.pdf"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "No se pudo extraer texto del PDF" })
        );
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let app = app(CARREFOUR);

        let response = app
            .clone()
            .oneshot(envelope("/invoices", b"photo bytes", "ticket.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let first = body_json(response).await;
        assert_eq!(first["estado"], "registrada");

        let response = app
            .oneshot(envelope("/invoices", b"photo bytes", "ticket.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let second = body_json(response).await;
        assert_eq!(second["estado"], "duplicada");
        assert_eq!(second["id"], first["id"]);
    }

    #[tokio::test]
    async fn test_bank_recipient_needs_resubmission() {
        let answer = r#"{"proveedor": "Galicia", "fecha": "05/02/2025", "total": 146910, "categoria": "Otros"}"#;
        let pipeline: LivePipeline = InvoicePipeline::new(
            &GastosConfig::default(),
            Box::new(TransferOcr) as Box<dyn OcrBackend>,
            Box::new(MockCompletionClient::new(answer)) as Box<dyn CompletionClient>,
            SqliteInvoiceStore::open_in_memory().unwrap(),
        );
        let pipeline = Arc::new(pipeline);

        let response = router(pipeline.clone(), 1024 * 1024)
            .oneshot(envelope("/invoices", b"photo bytes", "transferencia.png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(pipeline.store().invoice_count().unwrap(), 0);
    }

    struct TransferOcr;

    impl OcrBackend for TransferOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Ok("Comprobante de transferencia Banco Galicia".to_string())
        }
    }

    #[tokio::test]
    async fn test_service_unavailable() {
        let pipeline: LivePipeline = InvoicePipeline::new(
            &GastosConfig::default(),
            Box::new(FixedOcr) as Box<dyn OcrBackend>,
            Box::new(MockCompletionClient::unreachable("http://127.0.0.1:9"))
                as Box<dyn CompletionClient>,
            SqliteInvoiceStore::open_in_memory().unwrap(),
        );

        let response = router(Arc::new(pipeline), 1024 * 1024)
            .oneshot(envelope("/process", b"photo bytes", "ticket.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
