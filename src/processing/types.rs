//! Core data types and error definitions for the document pipeline.

use crate::inference::InferenceError;
use crate::qdrant::QdrantError;
use anyhow::Error as TokenizerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::decision::DecisionInfo;

/// Errors produced while turning raw text into token windows.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Window parameters would never advance through the token sequence.
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidConfiguration {
        /// Requested tokens per window.
        chunk_size: usize,
        /// Requested tokens shared between adjacent windows.
        overlap: usize,
    },
    /// Tokenizer resources were unavailable for the configured encoding.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding or model name we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
    /// Text could not be turned into token identifiers.
    #[error("failed to encode document: {0}")]
    Encode(#[source] TokenizerError),
    /// Token identifiers could not be turned back into text.
    #[error("failed to decode token window: {0}")]
    Decode(#[source] TokenizerError),
}

/// Errors raised while pulling text out of uploaded files.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The PDF parser rejected the document.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// The OCR engine failed or could not be started.
    #[error("OCR failed: {0}")]
    Ocr(String),
    /// Local IO failed while talking to the OCR process.
    #[error("IO error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors emitted by the document pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Tokenization or windowing failed.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// An upstream model call failed.
    #[error("Model inference failed: {0}")]
    ModelInference(#[from] InferenceError),
    /// Uploaded file content could not be turned into text.
    #[error("Failed to extract document text: {0}")]
    Extraction(#[from] ExtractionError),
    /// Qdrant rejected a history operation.
    #[error("Storage request failed: {0}")]
    Storage(#[from] QdrantError),
    /// A history record with the given identifier does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Final summary and decision heuristics for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOutcome {
    /// Re-summarized text stitched from all window summaries.
    pub summary: String,
    /// Outcome and judge heuristics taken from the raw text.
    pub decision: DecisionInfo,
    /// Number of token windows summarized.
    #[serde(skip)]
    pub chunk_count: usize,
    /// Whether the stitched summaries were cut at the token cap.
    #[serde(skip)]
    pub stitched_truncated: bool,
}

/// Answer span returned by the question-answering model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Extracted answer text.
    pub answer: String,
    /// Model confidence for the span.
    pub score: f32,
}

/// File content received from an upload, prior to text extraction.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    /// Client-side file name, if any.
    pub file_name: Option<String>,
}
