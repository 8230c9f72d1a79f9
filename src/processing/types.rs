//! Error definitions shared by the chunking and streaming stages.

use anyhow::Error as TokenizerError;
use thiserror::Error;

/// Errors produced while turning raw text into token-bounded chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer failed to encode or decode the document.
    #[error("tokenizer failed while {stage}: {source}")]
    Tokenizer {
        /// Whether encoding or decoding failed.
        stage: &'static str,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
    /// Blocking chunking task did not complete.
    #[error("chunking task failed: {0}")]
    Task(String),
}

impl ChunkingError {
    pub(crate) fn encode(source: tokenizers::Error) -> Self {
        Self::Tokenizer {
            stage: "encoding",
            source: anyhow::anyhow!(source),
        }
    }

    pub(crate) fn decode(source: tokenizers::Error) -> Self {
        Self::Tokenizer {
            stage: "decoding",
            source: anyhow::anyhow!(source),
        }
    }
}
