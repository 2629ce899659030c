//! Shared HTTP plumbing for hosted model endpoints.
//!
//! Summarization, question answering, and sentence embeddings are all served by an inference
//! API that accepts `POST {base}/models/{model}` with a JSON body. Each adapter builds its
//! own payload and response type on top of [`InferenceEndpoint`].

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced while calling a hosted model.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Inference provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Inference request failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One model behind the inference API.
#[derive(Clone)]
pub(crate) struct InferenceEndpoint {
    http: Client,
    base_url: String,
    model: String,
    api_token: Option<String>,
}

impl InferenceEndpoint {
    pub(crate) fn new(
        base_url: &str,
        model: &str,
        api_token: Option<String>,
        user_agent: &str,
    ) -> Result<Self, InferenceError> {
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim_matches('/').to_string(),
            api_token: api_token.filter(|token| !token.is_empty()),
        })
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    /// Post `payload` and decode the JSON response.
    pub(crate) async fn invoke<T: DeserializeOwned>(&self, payload: &Value) -> Result<T, InferenceError> {
        let mut request = self.http.post(self.endpoint()).json(payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|error| {
            InferenceError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.endpoint()
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(InferenceError::ProviderUnavailable(format!(
                "model endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(model = %self.model, %status, "Inference request failed");
            return Err(InferenceError::GenerationFailed(format!(
                "{} returned {status}: {body}",
                self.model
            )));
        }

        response.json().await.map_err(|error| {
            InferenceError::InvalidResponse(format!(
                "failed to decode {} response: {error}",
                self.model
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn invoke_sends_bearer_token_to_model_path() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/org/model")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let endpoint = InferenceEndpoint::new(
            &format!("{}/", server.base_url()),
            "org/model",
            Some("secret".into()),
            "lexbrief-test",
        )
        .expect("endpoint");
        let body: Value = endpoint.invoke(&json!({ "inputs": "x" })).await.expect("response");

        mock.assert();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn invoke_maps_missing_model_to_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/absent");
                then.status(404);
            })
            .await;

        let endpoint =
            InferenceEndpoint::new(&server.base_url(), "absent", None, "lexbrief-test").expect("endpoint");
        let error = endpoint
            .invoke::<Value>(&json!({}))
            .await
            .expect_err("missing model");
        assert!(matches!(error, InferenceError::ProviderUnavailable(_)));
    }
}
