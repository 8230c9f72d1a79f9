//! Line-per-chunk response stream.
//!
//! The stream owns the [`StagedUpload`], so the staged file is deleted however the stream ends:
//! normal completion, an early terminal line, or the HTTP body being dropped on disconnect.
//! A failed chunk never ends the stream; it is replaced by [`CHUNK_ERROR_LINE`].

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use futures_core::Stream;

use crate::extraction::extract_text;
use crate::processing::service::SummaryApi;
use crate::uploads::StagedUpload;

/// Sole line emitted when the document has no extractable text.
pub const NO_TEXT_LINE: &str = "No text found in file.\n";
/// Emitted in place of a chunk whose generation failed.
pub const CHUNK_ERROR_LINE: &str = "Error summarizing chunk.....\n";
/// Terminal line emitted when the document could not be parsed.
pub const EXTRACTION_ERROR_LINE: &str = "Error extracting text from file.\n";
/// Terminal line emitted when the tokenizer rejected the extracted text.
pub const CHUNKING_ERROR_LINE: &str = "Error splitting text into chunks.\n";

fn line(text: impl Into<String>) -> Result<String, Infallible> {
    Ok(text.into())
}

/// Extract, chunk, and summarize `upload`, yielding one newline-terminated line per chunk.
pub fn summary_stream<S>(
    service: Arc<S>,
    upload: StagedUpload,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static
where
    S: SummaryApi + ?Sized + 'static,
{
    stream! {
        let upload = upload;
        let file = upload.original_name().to_string();

        let text = match extract_text(upload.path()).await {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(file = %file, error = %error, "Failed to extract text");
                yield line(EXTRACTION_ERROR_LINE);
                return;
            }
        };

        let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
            tracing::info!(file = %file, "No text found in upload");
            yield line(NO_TEXT_LINE);
            return;
        };

        let chunks = match service.split_text(text).await {
            Ok(chunks) => chunks,
            Err(error) => {
                tracing::error!(file = %file, error = %error, "Failed to split text into chunks");
                yield line(CHUNKING_ERROR_LINE);
                return;
            }
        };

        let metrics = service.metrics();
        metrics.record_document();
        let total = chunks.len();
        for (idx, chunk) in chunks.into_iter().enumerate() {
            tracing::info!(file = %file, chunk = idx + 1, total, "Summarizing chunk");
            match service.summarize_chunk(chunk).await {
                Ok(summary) => {
                    metrics.record_chunk(true);
                    yield line(format!("{summary}\n"));
                }
                Err(error) => {
                    metrics.record_chunk(false);
                    tracing::warn!(file = %file, chunk = idx + 1, error = %error, "Chunk summarization failed");
                    yield line(CHUNK_ERROR_LINE);
                }
            }
        }

        tracing::info!(file = %file, chunks = total, "Finished streaming summaries");
    }
}
