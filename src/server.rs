use crate::config::Config;
use crate::engine::EngineHandle;
use crate::engines;
use crate::error::OcrError;
use crate::pdf::{self, PdfiumRasterizer, Rasterizer, RENDER_SCALE};
use crate::pipeline::{self, ImageData, ImageUnit};
use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, FromRequest, Multipart, Request, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngineHandle>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub config: Arc<Config>,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
}

/// Base64 image request body
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64Request {
    pub image_parts: Vec<ImagePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePart {
    pub mime_type: String,
    pub data: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Root response
#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub languages: Vec<String>,
    pub use_accelerator: bool,
    pub engine_ready: bool,
    pub pdf_render_scale: f32,
    pub max_file_size_bytes: usize,
    pub max_request_size_bytes: usize,
}

/// An uploaded file part
struct Upload {
    field: String,
    file_name: String,
    data: Bytes,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let model_dir = config.model_dir.clone();
    let engine = EngineHandle::new(config.engine.clone(), move |settings| {
        engines::build(settings, model_dir.clone())
    });

    if config.lazy_engine {
        tracing::info!("Engine construction deferred until the first OCR request");
    } else {
        engine.get().await?;
    }

    let state = AppState {
        engine: Arc::new(engine),
        rasterizer: Arc::new(PdfiumRasterizer::new(config.pdfium_lib_dir.clone())),
        config: Arc::new(config),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_request_size = state.config.max_request_size;

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/ocr", post(handle_ocr))
        .route("/ocr-pdf", post(handle_ocr_pdf))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle image OCR requests (multipart uploads or base64 JSON)
async fn handle_ocr(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<OcrResponse>, OcrError> {
    let start = Instant::now();

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let units = if content_type.starts_with("multipart/form-data") {
        let multipart = extract_multipart(request, &state).await?;

        collect_uploads(multipart, &state.config)
            .await?
            .into_iter()
            .map(|upload| ImageUnit {
                name: upload.file_name,
                data: ImageData::Upload(upload.data),
            })
            .collect::<Vec<_>>()
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<Base64Request>::from_request(request, &state)
            .await
            .map_err(|e| {
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    OcrError::PayloadTooLarge {
                        max: state.config.max_request_size,
                    }
                } else {
                    OcrError::InvalidRequest(e.body_text())
                }
            })?;

        body.image_parts
            .into_iter()
            .enumerate()
            .map(|(idx, part)| ImageUnit {
                name: part
                    .filename
                    .unwrap_or_else(|| format!("image {} ({})", idx + 1, part.mime_type)),
                data: ImageData::Base64(part.data),
            })
            .collect::<Vec<_>>()
    } else {
        return Err(OcrError::InvalidRequest(format!(
            "Unsupported content type '{}' (expected multipart/form-data or application/json)",
            content_type
        )));
    };

    if units.is_empty() {
        tracing::warn!("OCR request contained no files");
        return Err(OcrError::NoFiles);
    }

    let count = units.len();
    let engine = state.engine.get_for(&state.config.engine).await?;
    let text = pipeline::recognize_images(engine, units).await?;

    tracing::info!(
        "OCR completed for {} image(s) in {}ms, text length: {}",
        count,
        start.elapsed().as_millis(),
        text.len()
    );

    Ok(Json(OcrResponse { text }))
}

/// Handle PDF OCR requests
async fn handle_ocr_pdf(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<OcrResponse>, OcrError> {
    let start = Instant::now();

    let multipart = extract_multipart(request, &state).await?;
    let mut uploads = collect_uploads(multipart, &state.config).await?.into_iter();
    let upload = uploads.next().ok_or(OcrError::MissingFile)?;
    for extra in uploads {
        tracing::warn!(
            "Ignoring extra file '{}' in field '{}'",
            extra.file_name,
            extra.field
        );
    }

    if !upload.file_name.to_lowercase().ends_with(".pdf") {
        return Err(OcrError::WrongFileType(upload.file_name));
    }

    tracing::info!("Processing PDF: {}", upload.file_name);
    pdf::ensure_pdf_header(&upload.data).map_err(|e| {
        tracing::warn!("Rejected PDF {}: {}", upload.file_name, e);
        e
    })?;

    let engine = state.engine.get_for(&state.config.engine).await?;
    let name = upload.file_name;
    let result =
        pipeline::recognize_pdf(engine, Arc::clone(&state.rasterizer), name.clone(), upload.data)
            .await;

    let text = result.map_err(|e| {
        if e.status().is_client_error() {
            tracing::warn!("Rejected PDF {}: {}", name, e);
        } else {
            tracing::error!("Failed to process PDF {}: {}", name, e);
        }
        e
    })?;

    tracing::info!(
        "PDF OCR completed in {}ms, text length: {}",
        start.elapsed().as_millis(),
        text.len()
    );

    Ok(Json(OcrResponse { text }))
}

/// Parse a multipart body, reporting rejections in the JSON error format
async fn extract_multipart(request: Request, state: &AppState) -> Result<Multipart, OcrError> {
    Multipart::from_request(request, state)
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))
}

/// Read every file-bearing part, in submission order, whatever its field name.
///
/// Parts without a file name are plain form values and are skipped.
async fn collect_uploads(
    mut multipart: Multipart,
    config: &Config,
) -> Result<Vec<Upload>, OcrError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, config))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let field_name = field.name().unwrap_or_default().to_string();
        tracing::info!("Found file: {} -> {}", field_name, file_name);

        let data = read_field(field, config).await?;
        uploads.push(Upload {
            field: field_name,
            file_name,
            data,
        });
    }

    Ok(uploads)
}

async fn read_field(field: Field<'_>, config: &Config) -> Result<Bytes, OcrError> {
    let data = field.bytes().await.map_err(|e| multipart_error(e, config))?;

    if data.len() > config.max_file_size {
        return Err(OcrError::ImageTooLarge {
            size: data.len(),
            max: config.max_file_size,
        });
    }

    Ok(data)
}

fn multipart_error(e: MultipartError, config: &Config) -> OcrError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        OcrError::PayloadTooLarge {
            max: config.max_request_size,
        }
    } else {
        OcrError::InvalidRequest(format!("Failed to read multipart data: {}", e))
    }
}

/// Handle root requests
async fn handle_root() -> impl IntoResponse {
    Json(RootResponse {
        message: "OCR server is running - POST images to /ocr or a PDF to /ocr-pdf".to_string(),
    })
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.engine.settings();

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        languages: settings.languages.clone(),
        use_accelerator: settings.use_accelerator,
        engine_ready: state.engine.is_ready(),
        pdf_render_scale: RENDER_SCALE,
        max_file_size_bytes: state.config.max_file_size,
        max_request_size_bytes: state.config.max_request_size,
    })
}
