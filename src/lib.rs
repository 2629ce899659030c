#![deny(missing_docs)]

//! Core library for the Lexbrief legal document service.

/// Extractive question-answering abstraction and adapters.
pub mod answering;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Sentence-embedding abstraction and adapters.
pub mod embedding;
/// Saved summaries and answers.
pub mod history;
/// Shared transport for hosted model endpoints.
pub mod inference;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document pipeline: chunking, summarization, retrieval, and orchestration.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Summarization abstraction and adapters.
pub mod summarization;
