use crate::config::{Config, EmbeddingProvider};
use crate::inference::{InferenceEndpoint, InferenceError};
use async_trait::async_trait;
use serde_json::json;

/// Texts sent per feature-extraction request.
const EMBED_BATCH_SIZE: usize = 64;

/// Interface implemented by sentence-embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Produce one embedding vector per supplied text, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError>;
}

/// Build an embedder suitable for the current configuration.
pub fn get_embedder(config: &Config) -> Result<Box<dyn Embedder>, InferenceError> {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Initializing embedder"
    );
    match config.embedding_provider {
        EmbeddingProvider::HuggingFace => Ok(Box::new(HostedEmbedder::new(
            &config.inference_url,
            &config.embedding_model,
            config.inference_api_token.clone(),
        )?)),
        EmbeddingProvider::Hashed => Ok(Box::new(HashedEmbedder::new(config.embedding_dimension))),
    }
}

/// Embedder calling a hosted feature-extraction model.
pub struct HostedEmbedder {
    endpoint: InferenceEndpoint,
}

impl HostedEmbedder {
    /// Create an adapter for `model` served under `base_url`.
    pub fn new(
        base_url: &str,
        model: &str,
        api_token: Option<String>,
    ) -> Result<Self, InferenceError> {
        Ok(Self {
            endpoint: InferenceEndpoint::new(base_url, model, api_token, "lexbrief/embed")?,
        })
    }
}

#[async_trait]
impl Embedder for HostedEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (index, batch) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
            tracing::trace!(batch = index, size = batch.len(), "Embedding batch");
            let payload = json!({
                "inputs": batch,
                "options": { "wait_for_model": true },
            });
            let embeddings: Vec<Vec<f32>> = self.endpoint.invoke(&payload).await?;
            if embeddings.len() != batch.len() {
                return Err(InferenceError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            vectors.extend(embeddings);
        }
        Ok(vectors)
    }
}

/// Deterministic embedder hashing bytes into a normalized vector.
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    /// Construct a hashing embedder producing vectors of `dimension` values.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError> {
        if self.dimension == 0 {
            return Err(InferenceError::InvalidResponse(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn hashed_embedder_is_deterministic_and_normalized() {
        let embedder = HashedEmbedder::new(8);
        let vectors = embedder
            .embed(vec!["lease".into(), "lease".into(), String::new()])
            .await
            .expect("vectors");
        assert_eq!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(vectors[2].iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn hashed_embedder_rejects_zero_dimension() {
        let error = HashedEmbedder::new(0)
            .embed(vec!["text".into()])
            .await
            .expect_err("zero dimension");
        assert!(matches!(error, InferenceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn hosted_embedder_splits_requests_into_batches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/models/minilm");
                then.status(200).json_body(json!(vec![vec![0.5_f32, 0.5]; EMBED_BATCH_SIZE]));
            })
            .await;

        let embedder = HostedEmbedder::new(&server.base_url(), "minilm", None).expect("client");
        let texts: Vec<String> = (0..EMBED_BATCH_SIZE * 2).map(|i| format!("s{i}")).collect();
        let vectors = embedder.embed(texts).await.expect("vectors");

        mock.assert_hits(2);
        assert_eq!(vectors.len(), EMBED_BATCH_SIZE * 2);
    }

    #[tokio::test]
    async fn hosted_embedder_checks_vector_count() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/minilm");
                then.status(200).json_body(json!([[0.1, 0.2]]));
            })
            .await;

        let embedder = HostedEmbedder::new(&server.base_url(), "minilm", None).expect("client");
        let error = embedder
            .embed(vec!["a".into(), "b".into()])
            .await
            .expect_err("count mismatch");
        assert!(matches!(error, InferenceError::InvalidResponse(_)));
    }
}
