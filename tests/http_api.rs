use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use book_summarizer::{
    api::{LIVENESS_MESSAGE, create_router},
    metrics::SummaryMetrics,
    processing::{CHUNK_ERROR_LINE, ChunkingError, NO_TEXT_LINE, SummaryApi},
    summarization::SummarizationError,
    uploads::UploadSettings,
};
use tower::ServiceExt;

const BOUNDARY: &str = "book-summarizer-test-boundary";

/// Splits on whitespace into fixed-size word groups and echoes each group back.
struct WordChunks {
    words_per_chunk: usize,
    fail_on: Option<&'static str>,
    metrics: SummaryMetrics,
}

impl WordChunks {
    fn new(words_per_chunk: usize, fail_on: Option<&'static str>) -> Self {
        Self {
            words_per_chunk,
            fail_on,
            metrics: SummaryMetrics::new(),
        }
    }
}

#[async_trait]
impl SummaryApi for WordChunks {
    async fn split_text(&self, text: String) -> Result<Vec<String>, ChunkingError> {
        let words: Vec<&str> = text.split_whitespace().collect();
        Ok(words
            .chunks(self.words_per_chunk)
            .map(|group| group.join(" "))
            .collect())
    }

    async fn summarize_chunk(&self, chunk: String) -> Result<String, SummarizationError> {
        if self.fail_on.is_some_and(|word| chunk.contains(word)) {
            return Err(SummarizationError::ModelPoisoned);
        }
        Ok(format!("summary: {chunk}"))
    }

    fn metrics(&self) -> &SummaryMetrics {
        &self.metrics
    }
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    bytes: &'a [u8],
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n",
                part.name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/summarize")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn upload(filename: &str, bytes: &[u8]) -> Request<Body> {
    multipart_request(&[Part {
        name: "file",
        filename: Some(filename),
        bytes,
    }])
}

fn router(service: Arc<WordChunks>, temp_dir: &Path) -> Router {
    create_router(
        service,
        UploadSettings {
            temp_dir: temp_dir.to_path_buf(),
            max_bytes: 1024 * 1024,
        },
    )
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn error_message(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    json["error"].as_str().expect("error field").to_string()
}

fn staged_files(temp_dir: &Path) -> usize {
    std::fs::read_dir(temp_dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn home_reports_liveness() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(Arc::new(WordChunks::new(2, None)), dir.path());

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, LIVENESS_MESSAGE);
}

#[tokio::test]
async fn streams_one_summary_line_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app
        .oneshot(upload("moby.txt", b"call me ishmael some years ago"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_text(response).await;
    assert_eq!(
        body,
        "summary: call me\nsummary: ishmael some\nsummary: years ago\n"
    );
    assert_eq!(staged_files(&temp_dir), 0);
}

#[tokio::test]
async fn failed_chunk_is_replaced_by_marker() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, Some("ishmael"))), &temp_dir);

    let response = app
        .oneshot(upload("moby.txt", b"call me ishmael some years ago"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "summary: call me");
    assert_eq!(lines[1], CHUNK_ERROR_LINE.trim_end());
    assert_eq!(lines[2], "summary: years ago");
    assert_eq!(staged_files(&temp_dir), 0);
}

#[tokio::test]
async fn empty_text_file_reports_no_text() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app.oneshot(upload("empty.txt", b"")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, NO_TEXT_LINE);
    assert_eq!(staged_files(&temp_dir), 0);
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app
        .oneshot(multipart_request(&[Part {
            name: "notes",
            filename: Some("notes.txt"),
            bytes: b"not the upload field",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "No file uploaded");
    assert!(!temp_dir.exists());
}

#[tokio::test]
async fn non_multipart_body_is_rejected_as_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(Arc::new(WordChunks::new(2, None)), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/summarize")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "No file uploaded");
}

#[tokio::test]
async fn pdf_upload_streams_pages_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(1, None)), &temp_dir);
    let pdf = std::fs::read(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/documents/two_pages.pdf"),
    )
    .unwrap();

    let response = app.oneshot(upload("chapters.pdf", &pdf)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    let first = body.find("summary: Loomings\n").expect("first page summary");
    let second = body.find("summary: Carpetbag\n").expect("second page summary");
    assert!(first < second);
    assert_eq!(staged_files(&temp_dir), 0);
}

#[tokio::test]
async fn file_part_without_filename_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app
        .oneshot(multipart_request(&[Part {
            name: "file",
            filename: None,
            bytes: b"plain form value",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "No file uploaded");
    assert!(!temp_dir.exists());
}

#[tokio::test]
async fn file_upload_after_plain_file_value_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app
        .oneshot(multipart_request(&[
            Part {
                name: "file",
                filename: None,
                bytes: b"plain form value",
            },
            Part {
                name: "file",
                filename: Some("moby.txt"),
                bytes: b"call me ishmael",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "summary: call me\nsummary: ishmael\n"
    );
    assert_eq!(staged_files(&temp_dir), 0);
}

#[tokio::test]
async fn empty_filename_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app.oneshot(upload("", b"some text")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Empty filename");
    assert!(!temp_dir.exists());
}

#[tokio::test]
async fn unsupported_extension_is_rejected_without_staging() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("temp");
    let app = router(Arc::new(WordChunks::new(2, None)), &temp_dir);

    let response = app
        .oneshot(upload("thesis.docx", b"PK\x03\x04"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "Unsupported file type. Only PDF and TXT allowed."
    );
    assert!(!temp_dir.exists());
}

#[tokio::test]
async fn metrics_reflect_streamed_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(WordChunks::new(3, Some("ago")));
    let app = router(service.clone(), dir.path());

    let response = app
        .clone()
        .oneshot(upload("moby.txt", b"call me ishmael some years ago"))
        .await
        .unwrap();
    body_text(response).await;

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["documents_summarized"], 1);
    assert_eq!(json["chunks_summarized"], 1);
    assert_eq!(json["chunk_failures"], 1);
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(Arc::new(WordChunks::new(2, None)), dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/summarize")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    let allow_origin = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert_eq!(allow_origin, "*");
}
