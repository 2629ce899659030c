//! Token encoding used to size summarization windows and QA contexts.
//!
//! Window sizes and token budgets are measured in the summarization model's own tokens, so the
//! default tokenizer is the model's `tokenizer.json` loaded through the `tokenizers` crate. The
//! source may be a local file or a Hugging Face hub identifier. When it cannot be loaded the
//! service falls back to a `tiktoken-rs` encoding and logs a warning.

use std::path::Path;

use anyhow::{Error as TokenizerError, anyhow};
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};
use tokenizers::{FromPretrainedParameters, Tokenizer as HfModelTokenizer};

use super::extract::decode_text;
use super::types::ChunkingError;
use crate::config::Config;

/// Converts between text and token identifiers.
pub trait Tokenizer: Send + Sync {
    /// Encode text without special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkingError>;

    /// Decode a token window back into text.
    ///
    /// A window may start or end inside a character; the partial character is dropped.
    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkingError>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> Result<usize, ChunkingError> {
        Ok(self.encode(text)?.len())
    }
}

/// Build the tokenizer described by the configuration.
///
/// Loading may download `tokenizer.json` from the hub, so call this off the async runtime.
pub fn get_tokenizer(config: &Config) -> Result<Box<dyn Tokenizer>, ChunkingError> {
    match HfTokenizer::load(&config.tokenizer, config.inference_api_token.clone()) {
        Ok(tokenizer) => Ok(Box::new(tokenizer)),
        Err(error) => {
            tracing::warn!(
                tokenizer = %config.tokenizer,
                fallback = %config.tokenizer_encoding,
                %error,
                "Model tokenizer unavailable; falling back to tiktoken"
            );
            Ok(Box::new(TiktokenTokenizer::from_name(
                &config.tokenizer_encoding,
            )?))
        }
    }
}

/// Tokenizer backed by a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: HfModelTokenizer,
    source: String,
}

impl HfTokenizer {
    /// Load from a local file when `source` names one (or ends in `.json`), otherwise fetch
    /// the tokenizer of the hub model `source`.
    pub fn load(source: &str, api_token: Option<String>) -> Result<Self, ChunkingError> {
        let source = source.trim();
        let path = Path::new(source);
        if path.is_file() || source.ends_with(".json") {
            return Self::from_file(path);
        }
        let params = FromPretrainedParameters {
            token: api_token.filter(|token| !token.is_empty()),
            ..FromPretrainedParameters::default()
        };
        let inner = HfModelTokenizer::from_pretrained(source, Some(params))
            .map_err(|error| tokenizer_error(source, error))?;
        tracing::debug!(source, "Model tokenizer fetched");
        Self::configure(inner, source)
    }

    /// Load a `tokenizer.json` from disk.
    pub fn from_file(path: &Path) -> Result<Self, ChunkingError> {
        let source = path.display().to_string();
        let inner =
            HfModelTokenizer::from_file(path).map_err(|error| tokenizer_error(&source, error))?;
        tracing::debug!(%source, "Model tokenizer loaded");
        Self::configure(inner, &source)
    }

    /// File path or hub identifier the tokenizer was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn configure(mut inner: HfModelTokenizer, source: &str) -> Result<Self, ChunkingError> {
        // Windows are cut by the chunker; the tokenizer must see whole documents.
        inner.with_padding(None);
        inner
            .with_truncation(None)
            .map_err(|error| tokenizer_error(source, error))?;
        Ok(Self {
            inner,
            source: source.to_string(),
        })
    }
}

fn tokenizer_error(source: &str, error: tokenizers::Error) -> ChunkingError {
    ChunkingError::Tokenizer {
        encoding: source.to_string(),
        source: anyhow!(error),
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkingError> {
        self.inner
            .encode(text, false)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|error| ChunkingError::Encode(anyhow!(error)))
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkingError> {
        self.inner
            .decode(tokens, true)
            .map_err(|error| ChunkingError::Decode(anyhow!(error)))
    }
}

/// Tokenizer backed by a tiktoken byte-pair encoding.
pub struct TiktokenTokenizer {
    encoding: CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Resolve an encoding by model or encoding name.
    pub fn from_name(name: &str) -> Result<Self, ChunkingError> {
        let normalized = name.trim();
        let target = if normalized.is_empty() {
            "cl100k_base"
        } else {
            normalized
        };
        let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
            encoding: target.to_string(),
            source,
        })?;
        tracing::debug!(encoding = target, "Tokenizer initialized");
        Ok(Self {
            encoding,
            name: target.to_string(),
        })
    }

    /// Name the tokenizer was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkingError> {
        Ok(self.encoding.encode_ordinary(text))
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkingError> {
        // Byte-level tokens can split a character at either window edge.
        let bytes: Vec<u8> = self
            .encoding
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect();
        Ok(decode_text(&bytes))
    }
}

fn resolve_encoding(name: &str) -> Result<CoreBPE, TokenizerError> {
    if let Some(candidate) = encoding_from_name(name) {
        return candidate;
    }
    match get_bpe_from_model(name) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::warn!(
                name,
                error = %model_err,
                "Unknown tokenizer; falling back to 'cl100k_base'"
            );
            cl100k_base()
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}
