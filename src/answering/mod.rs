//! Extractive question answering behind the [`QuestionAnswerer`] interface.

use crate::config::Config;
use crate::inference::{InferenceEndpoint, InferenceError};
use crate::processing::Answer;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Interface implemented by extractive question-answering providers.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    /// Locate the answer to `question` inside `context`.
    async fn answer(&self, question: &str, context: &str) -> Result<Answer, InferenceError>;
}

/// Build the question answerer described by the configuration.
pub fn get_question_answerer(config: &Config) -> Result<Box<dyn QuestionAnswerer>, InferenceError> {
    Ok(Box::new(HostedQuestionAnswerer::new(
        &config.inference_url,
        &config.qa_model,
        config.inference_api_token.clone(),
    )?))
}

/// Question answerer calling a hosted extractive QA model.
pub struct HostedQuestionAnswerer {
    endpoint: InferenceEndpoint,
}

impl HostedQuestionAnswerer {
    /// Create an adapter for `model` served under `base_url`.
    pub fn new(
        base_url: &str,
        model: &str,
        api_token: Option<String>,
    ) -> Result<Self, InferenceError> {
        Ok(Self {
            endpoint: InferenceEndpoint::new(base_url, model, api_token, "lexbrief/qa")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnswerSpan {
    answer: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnswerResponse {
    One(AnswerSpan),
    Many(Vec<AnswerSpan>),
}

#[async_trait]
impl QuestionAnswerer for HostedQuestionAnswerer {
    async fn answer(&self, question: &str, context: &str) -> Result<Answer, InferenceError> {
        tracing::debug!(
            model = %self.endpoint.model(),
            context_chars = context.len(),
            "Requesting answer"
        );
        let payload = json!({
            "inputs": { "question": question, "context": context },
            "options": { "wait_for_model": true },
        });
        let span = match self.endpoint.invoke::<AnswerResponse>(&payload).await? {
            AnswerResponse::One(span) => span,
            AnswerResponse::Many(spans) => spans.into_iter().next().ok_or_else(|| {
                InferenceError::InvalidResponse("question answering returned no spans".into())
            })?,
        };
        Ok(Answer {
            answer: span.answer,
            score: span.score,
        })
    }
}
