//! Plain-text extraction for uploaded documents.
//!
//! Only two formats are understood: PDF (text layer of every page, in page order) and UTF-8
//! text files. Anything else yields `Ok(None)`, which callers treat the same as an empty
//! document.

use std::path::Path;
use thiserror::Error;

/// Errors raised while reading text out of a stored document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed to open or read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Text file content was not valid UTF-8.
    #[error("{path} is not valid UTF-8")]
    InvalidUtf8 {
        /// Offending file.
        path: String,
    },
    /// PDF parser rejected the document.
    #[error("failed to extract text from PDF {path}: {detail}")]
    Pdf {
        /// Offending file.
        path: String,
        /// Parser diagnostic.
        detail: String,
    },
    /// Blocking extraction task did not complete.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Document formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 plain text.
    Text,
}

impl DocumentKind {
    /// Map a file extension (without the dot, any case) to a supported kind.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    /// Determine the kind from a filename or path.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase extension used when storing uploads.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

/// Extract the raw text of the document at `path`.
///
/// Returns `Ok(None)` when the extension is not supported. The file itself is left untouched.
pub async fn extract_text(path: &Path) -> Result<Option<String>, ExtractionError> {
    let Some(kind) = DocumentKind::from_path(path) else {
        tracing::debug!(path = %path.display(), "No extractor for file extension");
        return Ok(None);
    };

    let display = path.display().to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ExtractionError::Io {
            path: display.clone(),
            source,
        })?;

    let text = match kind {
        DocumentKind::Text => {
            String::from_utf8(bytes).map_err(|_| ExtractionError::InvalidUtf8 { path: display })?
        }
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || pdf_text(&bytes, display))
            .await
            .map_err(|err| ExtractionError::Task(err.to_string()))??,
    };

    tracing::debug!(path = %path.display(), chars = text.len(), "Extracted document text");
    Ok(Some(text))
}

// pdf-extract panics on some malformed inputs instead of returning an error.
fn pdf_text(bytes: &[u8], path: String) -> Result<String, ExtractionError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(ExtractionError::Pdf {
            path,
            detail: err.to_string(),
        }),
        Err(_) => Err(ExtractionError::Pdf {
            path,
            detail: "parser panicked".to_string(),
        }),
    }
}
