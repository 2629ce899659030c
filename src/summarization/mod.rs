//! Abstractive summarization behind the [`Summarizer`] interface.
//!
//! The pipeline asks for deterministic beam-search decoding; the hosted adapter forwards the
//! decoding knobs as generation parameters of a Hugging Face style summarization endpoint.

use crate::config::Config;
use crate::inference::{InferenceEndpoint, InferenceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Decoding parameters applied to every summarization call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodingParams {
    /// Beam search width.
    pub num_beams: u32,
    /// N-gram size that may not repeat in the output.
    pub no_repeat_ngram_size: u32,
    /// Penalty applied to repeated tokens.
    pub repetition_penalty: f32,
    /// Exponential length penalty used by beam scoring.
    pub length_penalty: f32,
    /// Stop once every beam has finished.
    pub early_stopping: bool,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            num_beams: 4,
            no_repeat_ngram_size: 3,
            repetition_penalty: 2.5,
            length_penalty: 1.0,
            early_stopping: true,
        }
    }
}

/// Request payload passed to the summarization provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizationRequest {
    /// Prefixed input text.
    pub input: String,
    /// Maximum output length in tokens.
    pub max_tokens: usize,
    /// Minimum output length in tokens, when enforced.
    pub min_tokens: Option<usize>,
    /// Decoding parameters.
    pub decoding: DecodingParams,
}

/// Interface implemented by abstractive summarization providers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize the request input. Empty output is returned as-is.
    async fn summarize(&self, request: SummarizationRequest) -> Result<String, InferenceError>;
}

/// Build the summarizer described by the configuration.
pub fn get_summarizer(config: &Config) -> Result<Box<dyn Summarizer>, InferenceError> {
    Ok(Box::new(HostedSummarizer::new(
        &config.inference_url,
        &config.summarization_model,
        config.inference_api_token.clone(),
    )?))
}

/// Summarizer calling a hosted summarization model.
pub struct HostedSummarizer {
    endpoint: InferenceEndpoint,
}

impl HostedSummarizer {
    /// Create an adapter for `model` served under `base_url`.
    pub fn new(
        base_url: &str,
        model: &str,
        api_token: Option<String>,
    ) -> Result<Self, InferenceError> {
        Ok(Self {
            endpoint: InferenceEndpoint::new(base_url, model, api_token, "lexbrief/summary")?,
        })
    }

    fn payload(request: &SummarizationRequest) -> Value {
        let DecodingParams {
            num_beams,
            no_repeat_ngram_size,
            repetition_penalty,
            length_penalty,
            early_stopping,
        } = request.decoding;
        let mut parameters = json!({
            "max_length": request.max_tokens,
            "num_beams": num_beams,
            "no_repeat_ngram_size": no_repeat_ngram_size,
            "repetition_penalty": repetition_penalty,
            "length_penalty": length_penalty,
            "early_stopping": early_stopping,
        });
        if let Some(min_tokens) = request.min_tokens
            && let Some(object) = parameters.as_object_mut()
        {
            object.insert("min_length".into(), Value::from(min_tokens));
        }
        json!({
            "inputs": request.input,
            "parameters": parameters,
            "options": { "wait_for_model": true },
        })
    }
}

#[derive(Debug, Deserialize)]
struct SummaryItem {
    #[serde(alias = "generated_text")]
    summary_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummaryResponse {
    Many(Vec<SummaryItem>),
    One(SummaryItem),
}

#[async_trait]
impl Summarizer for HostedSummarizer {
    async fn summarize(&self, request: SummarizationRequest) -> Result<String, InferenceError> {
        tracing::debug!(
            model = %self.endpoint.model(),
            max_tokens = request.max_tokens,
            min_tokens = ?request.min_tokens,
            "Requesting summary"
        );
        let response: SummaryResponse = self.endpoint.invoke(&Self::payload(&request)).await?;
        let item = match response {
            SummaryResponse::Many(items) => items.into_iter().next().ok_or_else(|| {
                InferenceError::InvalidResponse("summarizer returned no candidates".into())
            })?,
            SummaryResponse::One(item) => item,
        };
        Ok(item.summary_text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn request(min_tokens: Option<usize>) -> SummarizationRequest {
        SummarizationRequest {
            input: "summarize: the appeal".into(),
            max_tokens: 120,
            min_tokens,
            decoding: DecodingParams::default(),
        }
    }

    #[tokio::test]
    async fn hosted_summarizer_forwards_decoding_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/t5-small")
                    .json_body_partial(
                        json!({
                            "inputs": "summarize: the appeal",
                            "parameters": {
                                "max_length": 500,
                                "min_length": 480,
                                "num_beams": 4,
                                "no_repeat_ngram_size": 3,
                                "early_stopping": true
                            }
                        })
                        .to_string(),
                    );
                then.status(200)
                    .json_body(json!([{ "summary_text": " Summary text " }]));
            })
            .await;

        let summarizer = HostedSummarizer::new(&server.base_url(), "t5-small", None).expect("client");
        let summary = summarizer
            .summarize(SummarizationRequest {
                max_tokens: 500,
                ..request(Some(480))
            })
            .await
            .expect("summary");

        mock.assert();
        assert_eq!(summary, "Summary text");
    }

    #[test]
    fn payload_omits_min_length_when_not_enforced() {
        let payload = HostedSummarizer::payload(&request(None));
        assert!(payload["parameters"].get("min_length").is_none());
        assert_eq!(payload["parameters"]["max_length"], 120);
    }

    #[tokio::test]
    async fn hosted_summarizer_accepts_generated_text_objects() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/t5-small");
                then.status(200).json_body(json!({ "generated_text": "short" }));
            })
            .await;

        let summarizer = HostedSummarizer::new(&server.base_url(), "t5-small", None).expect("client");
        let summary = summarizer.summarize(request(None)).await.expect("summary");
        assert_eq!(summary, "short");
    }

    #[tokio::test]
    async fn hosted_summarizer_reports_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/t5-small");
                then.status(500).body("boom");
            })
            .await;

        let summarizer = HostedSummarizer::new(&server.base_url(), "t5-small", None).expect("client");
        let error = summarizer
            .summarize(request(None))
            .await
            .expect_err("error response");
        assert!(
            matches!(error, InferenceError::GenerationFailed(ref message) if message.contains("500"))
        );
    }
}
