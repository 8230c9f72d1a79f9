use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing summarization activity.
#[derive(Default)]
pub struct SummaryMetrics {
    documents_summarized: AtomicU64,
    chunks_summarized: AtomicU64,
    chunk_failures: AtomicU64,
}

impl SummaryMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document whose text was extracted and split into chunks.
    pub fn record_document(&self) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a single chunk.
    pub fn record_chunk(&self, succeeded: bool) {
        if succeeded {
            self.chunks_summarized.fetch_add(1, Ordering::Relaxed);
        } else {
            self.chunk_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            chunk_failures: self.chunk_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of summarization counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that reached the chunking stage since startup.
    pub documents_summarized: u64,
    /// Chunks that produced a summary.
    pub chunks_summarized: u64,
    /// Chunks whose generation failed and were replaced by the error marker.
    pub chunk_failures: u64,
}
