//! Document processing pipeline: chunking, per-chunk summarization, and response streaming.

pub mod chunking;
mod service;
pub mod stream;
pub mod types;

pub use service::{SummaryApi, SummaryService};
pub use stream::{
    CHUNK_ERROR_LINE, CHUNKING_ERROR_LINE, EXTRACTION_ERROR_LINE, NO_TEXT_LINE, summary_stream,
};
pub use types::ChunkingError;
