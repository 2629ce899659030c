use crate::processing::chunking::ChunkWindow;
use crate::processing::types::ChunkingError;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Chunker parameters cannot produce a forward-moving window.
    #[error("Invalid chunking configuration: {0}")]
    InvalidChunking(#[from] ChunkingError),
}

/// Runtime configuration for the Lexbrief server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the inference API serving `POST {base}/models/{model}`.
    pub inference_url: String,
    /// Optional bearer token sent to the inference API.
    pub inference_api_token: Option<String>,
    /// Summarization model identifier.
    pub summarization_model: String,
    /// Extractive question-answering model identifier.
    pub qa_model: String,
    /// Embedding provider used for sentence retrieval and record vectors.
    pub embedding_provider: EmbeddingProvider,
    /// Sentence-embedding model identifier.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Hub model id or `tokenizer.json` path whose tokens size windows and budgets.
    pub tokenizer: String,
    /// Tiktoken model or encoding name used when `tokenizer` cannot be loaded.
    pub tokenizer_encoding: String,
    /// Tokens per summarization window.
    pub chunk_size: usize,
    /// Tokens shared between adjacent windows.
    pub chunk_overlap: usize,
    /// Output cap for each per-window summary.
    pub max_chunk_summary_tokens: usize,
    /// Lower bound on the final summary length.
    pub min_final_tokens: usize,
    /// Upper bound on the final summary length.
    pub max_final_tokens: usize,
    /// Sentences kept when a QA context is reduced by retrieval.
    pub retrieval_top_k: usize,
    /// Document token count above which QA contexts are reduced.
    pub retrieval_token_threshold: usize,
    /// OCR executable invoked for image uploads.
    pub ocr_command: String,
    /// Base URL of the Qdrant instance holding saved records.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hugging Face style feature-extraction endpoint.
    HuggingFace,
    /// Deterministic local byte-hashing embeddings.
    Hashed,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let summarization_model =
            load_env_optional("SUMMARIZATION_MODEL").unwrap_or_else(|| "t5-small".into());
        let config = Self {
            inference_url: load_env("INFERENCE_URL")?,
            inference_api_token: load_env_optional("INFERENCE_API_TOKEN"),
            tokenizer: load_env_optional("TOKENIZER")
                .unwrap_or_else(|| summarization_model.clone()),
            summarization_model,
            qa_model: load_env_optional("QA_MODEL")
                .unwrap_or_else(|| "deepset/roberta-base-squad2".into()),
            embedding_provider: load_env_or("EMBEDDING_PROVIDER", EmbeddingProvider::HuggingFace)?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "sentence-transformers/all-MiniLM-L6-v2".into()),
            embedding_dimension: load_env_or("EMBEDDING_DIMENSION", 384)?,
            tokenizer_encoding: load_env_optional("TOKENIZER_ENCODING")
                .unwrap_or_else(|| "cl100k_base".into()),
            chunk_size: load_env_or("CHUNK_SIZE", 500)?,
            chunk_overlap: load_env_or("CHUNK_OVERLAP", 50)?,
            max_chunk_summary_tokens: load_env_or("MAX_CHUNK_SUMMARY_TOKENS", 120)?,
            min_final_tokens: load_env_or("MIN_FINAL_TOKENS", 480)?,
            max_final_tokens: load_env_or("MAX_FINAL_TOKENS", 500)?,
            retrieval_top_k: load_env_or("RETRIEVAL_TOP_K", 20)?,
            retrieval_token_threshold: load_env_or("RETRIEVAL_TOKEN_THRESHOLD", 450)?,
            ocr_command: load_env_optional("OCR_COMMAND").unwrap_or_else(|| "tesseract".into()),
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that individual parsers cannot see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ChunkWindow::new(self.chunk_size, self.chunk_overlap)?;
        if self.min_final_tokens > self.max_final_tokens {
            return Err(ConfigError::InvalidValue(
                "MIN_FINAL_TOKENS must not exceed MAX_FINAL_TOKENS".into(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        Ok(())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "hashed" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        inference_url = %config.inference_url,
        summarization_model = %config.summarization_model,
        qa_model = %config.qa_model,
        tokenizer = %config.tokenizer,
        embedding_provider = ?config.embedding_provider,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        inference_url: "http://127.0.0.1:9".into(),
        inference_api_token: None,
        summarization_model: "t5-small".into(),
        qa_model: "deepset/roberta-base-squad2".into(),
        embedding_provider: EmbeddingProvider::Hashed,
        embedding_model: "sentence-transformers/all-MiniLM-L6-v2".into(),
        embedding_dimension: 16,
        tokenizer: "t5-small".into(),
        tokenizer_encoding: "cl100k_base".into(),
        chunk_size: 500,
        chunk_overlap: 50,
        max_chunk_summary_tokens: 120,
        min_final_tokens: 480,
        max_final_tokens: 500,
        retrieval_top_k: 20,
        retrieval_token_threshold: 450,
        ocr_command: "tesseract".into(),
        qdrant_url: "http://127.0.0.1:6333".into(),
        qdrant_api_key: None,
        server_port: None,
    }
}
