//! Summary service wiring the tokenizer-driven chunker to the shared model.

use crate::{
    config::Config,
    metrics::SummaryMetrics,
    processing::{chunking::split_text, types::ChunkingError},
    summarization::{GenerationConfig, LocalSummarizer, ModelLoadError, SummarizationError},
};
use async_trait::async_trait;

/// Owns the pretrained model and the counters shared by every request.
///
/// Construct once at startup and share through an `Arc`; the model itself serializes
/// generation internally.
pub struct SummaryService {
    summarizer: LocalSummarizer,
    chunk_tokens: usize,
    metrics: SummaryMetrics,
}

/// Abstraction over the summarization pipeline used by the HTTP surface.
#[async_trait]
pub trait SummaryApi: Send + Sync {
    /// Split extracted text into ordered, token-bounded chunks.
    async fn split_text(&self, text: String) -> Result<Vec<String>, ChunkingError>;

    /// Generate the summary for a single chunk.
    async fn summarize_chunk(&self, chunk: String) -> Result<String, SummarizationError>;

    /// Counters updated as documents stream through the pipeline.
    fn metrics(&self) -> &SummaryMetrics;
}

impl SummaryService {
    /// Load the model named by `config` and build the service around it.
    pub fn load(config: &Config) -> Result<Self, ModelLoadError> {
        tracing::info!(model_dir = %config.model_dir.display(), "Loading summarization model");
        let summarizer =
            LocalSummarizer::load(&config.model_dir, GenerationConfig::from_config(config))?;
        Ok(Self::new(summarizer, config.max_input_tokens))
    }

    /// Build a service around an already loaded model.
    pub fn new(summarizer: LocalSummarizer, chunk_tokens: usize) -> Self {
        Self {
            summarizer,
            chunk_tokens,
            metrics: SummaryMetrics::new(),
        }
    }
}

#[async_trait]
impl SummaryApi for SummaryService {
    async fn split_text(&self, text: String) -> Result<Vec<String>, ChunkingError> {
        // Whole-document tokenization is CPU bound and stays off the async workers.
        let summarizer = self.summarizer.clone();
        let chunk_tokens = self.chunk_tokens;
        tokio::task::spawn_blocking(move || {
            split_text(summarizer.tokenizer(), &text, chunk_tokens)
        })
        .await
        .map_err(|err| ChunkingError::Task(err.to_string()))?
    }

    async fn summarize_chunk(&self, chunk: String) -> Result<String, SummarizationError> {
        self.summarizer.summarize(chunk).await
    }

    fn metrics(&self) -> &SummaryMetrics {
        &self.metrics
    }
}
