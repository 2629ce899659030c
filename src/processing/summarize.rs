//! Chunked summarization with a stitching pass.
//!
//! Each token window is summarized on its own, the window summaries are joined, and the joined
//! text is summarized once more under the final length bounds. The joined text is cut at
//! [`STITCHED_TOKEN_CAP`] tokens before the final pass; anything past the cap is dropped.

use crate::config::Config;
use crate::summarization::{DecodingParams, SummarizationRequest, Summarizer};

use super::chunking::ChunkWindow;
use super::tokenizer::Tokenizer;
use super::types::{ChunkingError, ProcessingError};

/// Instruction prefix understood by text-to-text summarization models.
pub const SUMMARY_PREFIX: &str = "summarize: ";
/// Token cap applied to the stitched input of the final pass.
pub const STITCHED_TOKEN_CAP: usize = 512;

/// Length bounds and window geometry for one summarization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryParams {
    /// Token window geometry.
    pub window: ChunkWindow,
    /// Output cap for each window summary.
    pub max_chunk_summary_tokens: usize,
    /// Lower bound on the final summary.
    pub min_final_tokens: usize,
    /// Upper bound on the final summary.
    pub max_final_tokens: usize,
    /// Decoding parameters shared by every call.
    pub decoding: DecodingParams,
}

impl SummaryParams {
    /// Derive parameters from configuration, validating the window.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        Ok(Self {
            window: ChunkWindow::new(config.chunk_size, config.chunk_overlap)?,
            max_chunk_summary_tokens: config.max_chunk_summary_tokens,
            min_final_tokens: config.min_final_tokens,
            max_final_tokens: config.max_final_tokens,
            decoding: DecodingParams::default(),
        })
    }
}

/// Result of the stitched summarization.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedSummary {
    /// Final summary text.
    pub summary: String,
    /// Number of windows summarized.
    pub chunk_count: usize,
    /// Whether the stitched input exceeded [`STITCHED_TOKEN_CAP`].
    pub truncated: bool,
}

/// Summarize every window of `text`, then summarize the stitched window summaries.
pub async fn summarize_stitched(
    text: &str,
    tokenizer: &dyn Tokenizer,
    summarizer: &dyn Summarizer,
    params: &SummaryParams,
) -> Result<StitchedSummary, ProcessingError> {
    let tokens = tokenizer.encode(text)?;
    let chunks = params.window.chunks(&tokens);
    let chunk_count = chunks.len();
    tracing::debug!(
        tokens = tokens.len(),
        chunk_count,
        chunk_size = params.window.chunk_size(),
        overlap = params.window.overlap(),
        "Summarizing token windows"
    );

    let mut partials = Vec::with_capacity(chunk_count);
    for (index, chunk) in chunks.enumerate() {
        let input = format!("{SUMMARY_PREFIX}{}", tokenizer.decode(chunk)?);
        let partial = summarizer
            .summarize(SummarizationRequest {
                input,
                max_tokens: params.max_chunk_summary_tokens,
                min_tokens: None,
                decoding: params.decoding,
            })
            .await?;
        if partial.is_empty() {
            tracing::warn!(chunk = index, "Summarizer returned an empty window summary");
        }
        partials.push(partial);
    }

    let stitched = format!("{SUMMARY_PREFIX}{}", partials.join(" "));
    let mut stitched_tokens = tokenizer.encode(&stitched)?;
    let truncated = stitched_tokens.len() > STITCHED_TOKEN_CAP;
    if truncated {
        tracing::warn!(
            tokens = stitched_tokens.len(),
            cap = STITCHED_TOKEN_CAP,
            "Stitched summaries exceed the cap; trailing content dropped"
        );
        stitched_tokens.truncate(STITCHED_TOKEN_CAP);
    }
    let input = if truncated {
        tokenizer.decode(&stitched_tokens)?
    } else {
        stitched
    };

    let summary = summarizer
        .summarize(SummarizationRequest {
            input,
            max_tokens: params.max_final_tokens,
            min_tokens: Some(params.min_final_tokens),
            decoding: params.decoding,
        })
        .await?;
    if summary.is_empty() {
        tracing::warn!("Summarizer returned an empty final summary");
    }

    Ok(StitchedSummary {
        summary,
        chunk_count,
        truncated,
    })
}
