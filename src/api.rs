//! HTTP surface for the summarizer.
//!
//! - `GET /` – Liveness string.
//! - `POST /summarize` – Multipart upload (field `file`, `.pdf` or `.txt`). Validation failures
//!   return `400 {"error": ...}`; otherwise the response is `text/plain` and streams one line per
//!   chunk summary as soon as each is generated.
//! - `GET /metrics` – Document and chunk counters.
//!
//! CORS is permissive so browser front-ends on other origins can call the API.

use crate::extraction::DocumentKind;
use crate::metrics::MetricsSnapshot;
use crate::processing::{SummaryApi, summary_stream};
use crate::uploads::{StagedUpload, UploadError, UploadSettings};
use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;

/// Body of `GET /`.
pub const LIVENESS_MESSAGE: &str = "📚 Book Summarization API is Running!";

const UPLOAD_FIELD: &str = "file";

/// Shared handler state.
struct AppState<S: ?Sized> {
    service: Arc<S>,
    temp_dir: Arc<PathBuf>,
}

impl<S: ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            temp_dir: Arc::clone(&self.temp_dir),
        }
    }
}

/// Build the HTTP router exposing the summarization API.
pub fn create_router<S>(service: Arc<S>, uploads: UploadSettings) -> Router
where
    S: SummaryApi + 'static,
{
    Router::new()
        .route("/", get(home))
        .route("/summarize", post(summarize_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(uploads.max_bytes))
        .layer(CorsLayer::permissive())
        .with_state(AppState {
            service,
            temp_dir: Arc::new(uploads.temp_dir),
        })
}

async fn home() -> &'static str {
    LIVENESS_MESSAGE
}

/// Validate and stage the upload, then stream per-chunk summaries back.
///
/// No streaming starts (and nothing is written to disk) until the `file` part has passed
/// validation. The staged file moves into the stream and is deleted when the stream ends.
async fn summarize_document<S>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError>
where
    S: SummaryApi + 'static,
{
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Request body is not multipart");
        ApiError::NoFile
    })?;

    let upload = loop {
        let Some(mut field) = multipart.next_field().await? else {
            return Err(ApiError::NoFile);
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // Without a filename attribute the part is a plain form value, not a file upload.
        let Some(filename) = field.file_name().map(str::to_owned) else {
            tracing::debug!("Skipping `file` part without a filename");
            continue;
        };
        let kind = validate_filename(&filename)?;
        break stage_field(&state.temp_dir, &filename, kind, &mut field).await?;
    };

    tracing::info!(
        file = upload.original_name(),
        kind = ?upload.kind(),
        "Accepted upload for summarization"
    );

    let body = Body::from_stream(summary_stream(state.service, upload));
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

fn validate_filename(filename: &str) -> Result<DocumentKind, ApiError> {
    if filename.is_empty() {
        return Err(ApiError::EmptyFilename);
    }
    DocumentKind::from_path(filename).ok_or(ApiError::UnsupportedType)
}

async fn stage_field(
    temp_dir: &std::path::Path,
    filename: &str,
    kind: DocumentKind,
    field: &mut Field<'_>,
) -> Result<StagedUpload, ApiError> {
    let (upload, mut file) = StagedUpload::create(temp_dir, filename, kind).await?;
    // On any error below `upload` is dropped, which removes the partial file.
    while let Some(bytes) = field.chunk().await? {
        file.write_all(&bytes)
            .await
            .map_err(|err| upload.io_error(err))?;
    }
    file.flush().await.map_err(|err| upload.io_error(err))?;
    Ok(upload)
}

/// Return summarization counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: SummaryApi + 'static,
{
    Json(state.service.metrics().snapshot())
}

/// Errors surfaced synchronously, before any streaming begins.
#[derive(Debug, Error)]
enum ApiError {
    #[error("No file uploaded")]
    NoFile,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Unsupported file type. Only PDF and TXT allowed.")]
    UnsupportedType,
    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Failed to store upload")]
    Storage(#[from] UploadError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NoFile | Self::EmptyFilename | Self::UnsupportedType => StatusCode::BAD_REQUEST,
            Self::Multipart(err) => err.status(),
            Self::Storage(err) => {
                tracing::error!(error = %err, "Failed to stage upload");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
