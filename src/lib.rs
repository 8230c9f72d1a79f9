#![deny(missing_docs)]

//! Core library for the streaming document summarization server.

/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Text extraction from uploaded PDF and text files.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Summarization counters.
pub mod metrics;
/// Chunking, per-chunk summarization, and response streaming.
pub mod processing;
/// Pretrained seq2seq model and beam search decoding.
pub mod summarization;
/// Request-scoped staging of uploaded files.
pub mod uploads;
