//! Request-scoped staging of uploaded documents.
//!
//! Each upload is written under the temp directory with a generated name so concurrent
//! requests never share a path, even when clients send identical filenames. The staged file is
//! removed when the [`StagedUpload`] guard is dropped, which happens when the response stream
//! completes, errors, or is abandoned by the client.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use uuid::Uuid;

use crate::config::Config;
use crate::extraction::DocumentKind;

/// Errors raised while staging an upload on disk.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The temp directory or file could not be created or written.
    #[error("failed to stage upload at {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Limits and locations applied to incoming uploads.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Directory where uploads are staged.
    pub temp_dir: PathBuf,
    /// Largest accepted request body in bytes.
    pub max_bytes: usize,
}

impl UploadSettings {
    /// Build settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            temp_dir: config.upload_temp_dir.clone(),
            max_bytes: config.max_upload_bytes,
        }
    }
}

/// An uploaded document persisted for the lifetime of one request.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    original_name: String,
    kind: DocumentKind,
}

impl StagedUpload {
    /// Create an empty staged file and return it with a handle for writing the upload bytes.
    pub async fn create(
        temp_dir: &Path,
        original_name: &str,
        kind: DocumentKind,
    ) -> Result<(Self, File), UploadError> {
        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|source| UploadError::Io {
                path: temp_dir.to_path_buf(),
                source,
            })?;

        let path = temp_dir.join(format!("{}.{}", Uuid::new_v4(), kind.extension()));
        let file = File::create(&path)
            .await
            .map_err(|source| UploadError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %path.display(),
            original_name,
            "Staged upload"
        );

        Ok((
            Self {
                path,
                original_name: original_name.to_string(),
                kind,
            },
            file,
        ))
    }

    /// Location of the staged bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filename supplied by the client.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Validated document kind.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Wrap an I/O failure on the staged file.
    pub fn io_error(&self, source: std::io::Error) -> UploadError {
        UploadError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        // Drop cannot await; one unlink is short enough to run inline on the async thread.
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed staged upload"),
            Err(err) => tracing::debug!(
                path = %self.path.display(),
                error = %err,
                "Staged upload already gone"
            ),
        }
    }
}
