//! HTTP API server.
//!
//! Exposes upload, extraction and question answering over a JSON HTTP API.
//! Every handler delegates to a shared [`RagService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload` | Ingest a file (multipart field `file`) |
//! | `POST` | `/extract-text` | Return a file's extracted text without storing it |
//! | `GET`  | `/query?q=...` | Answer a question from the stored documents |
//! | `GET`  | `/documents` | List stored documents (`[{id, title}]`) |
//! | `GET`  | `/health` | Health check (status, version, document count) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Query must be at least 3 characters long." } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413),
//! `upstream_error` (502), `storage_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend can
//! be served from anywhere.

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        DefaultBodyLimit, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::{RagError, ValidationError};
use crate::models::{DocumentSummary, QueryAnswer, UploadOutcome};
use crate::rag::RagService;

/// Allowance for multipart framing on top of the document size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
}

/// Starts the HTTP server.
///
/// Builds the [`RagService`] from `config` (failing before binding when
/// provider credentials are missing), then serves on `[server].bind` until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(RagService::from_config(config).await?);
    serve(service, &config.server.bind).await
}

/// Serve `service` on `bind_addr`.
pub async fn serve(service: Arc<RagService>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("docsage listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router with CORS and the request body limit applied.
pub fn router(service: Arc<RagService>) -> Router {
    let body_limit = service
        .limits()
        .max_doc_size
        .saturating_add(MULTIPART_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(handle_upload))
        .route("/extract-text", post(handle_extract))
        .route("/query", get(handle_query))
        .route("/documents", get(handle_documents))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(AppState { service })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"upstream_error"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::Validation(ValidationError::FileTooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
            }
            RagError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            RagError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };

        if status.is_server_error() {
            tracing::error!(code, "{}", err);
        } else {
            tracing::warn!(code, "{}", err);
        }

        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        RagError::from(err).into()
    }
}

// ============ Multipart upload ============

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Pull the `file` field out of a multipart body.
///
/// An over-limit body surfaces as [`ValidationError::FileTooLarge`]; any
/// other malformed body or a missing field is [`ValidationError::MissingFile`].
async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
    max_doc_size: usize,
) -> Result<UploadedFile, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("rejected multipart body: {}", e);
        AppError::from(ValidationError::MissingFile)
    })?;

    let too_large = |status: StatusCode| -> AppError {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ValidationError::FileTooLarge {
                limit: max_doc_size,
            }
            .into()
        } else {
            ValidationError::MissingFile.into()
        }
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| too_large(e.status()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| too_large(e.status()))?;
        return Ok(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(ValidationError::MissingFile.into())
}

// ============ POST /upload ============

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutcome>, AppError> {
    let file = read_file_field(multipart, state.service.limits().max_doc_size).await?;
    let outcome = state.service.upload(&file.filename, &file.bytes).await?;
    Ok(Json(outcome))
}

// ============ POST /extract-text ============

#[derive(Serialize)]
struct ExtractResponse {
    filename: String,
    text: String,
}

async fn handle_extract(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, AppError> {
    let file = read_file_field(multipart, state.service.limits().max_doc_size).await?;
    let text = state.service.extract(&file.filename, &file.bytes).await?;
    Ok(Json(ExtractResponse {
        filename: file.filename,
        text,
    }))
}

// ============ GET /query ============

#[derive(Deserialize)]
struct QueryParams {
    q: Option<String>,
}

/// A missing `q` is treated as the empty query and rejected as too short.
async fn handle_query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryAnswer>, AppError> {
    let question = params.q.unwrap_or_default();
    let answer = state.service.query(&question).await?;
    Ok(Json(answer))
}

// ============ GET /documents ============

async fn handle_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    Ok(Json(state.service.list_documents().await?))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
    /// `null` when the store could not be counted.
    documents: Option<usize>,
}

/// Liveness only: a store failure is logged and reported as `documents: null`.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let documents = match state.service.document_count().await {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::error!("health check could not count documents: {}", err);
            None
        }
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents,
    })
}
