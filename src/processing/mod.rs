//! Document pipeline: token windows, stitched summaries, decision heuristics, sentence
//! retrieval, and per-request orchestration.

pub mod answer;
pub mod chunking;
pub mod decision;
pub mod extract;
pub mod retrieval;
mod service;
pub mod summarize;
pub mod tokenizer;
pub mod types;

pub use decision::DecisionInfo;
pub use service::{LegalApi, LegalService, ServiceParts};
pub use types::{
    Answer, ChunkingError, ExtractionError, ProcessingError, SummaryOutcome, Upload,
};
