//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::types::{QdrantError, ScrollResponse, StoredPoint};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        Self::with_base_url(&config.qdrant_url, config.qdrant_api_key.clone())
    }

    /// Construct a client for an explicit Qdrant URL.
    pub fn with_base_url(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("lexbrief/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(collection = collection_name, "Collection created");
        })
        .await
    }

    /// Ensure keyword/datetime payload indexes exist for the given fields.
    ///
    /// Failures are logged and skipped; filtering still works without an index.
    pub async fn ensure_payload_indexes(
        &self,
        collection_name: &str,
        fields: &[(&str, &str)],
    ) -> Result<(), QdrantError> {
        for &(field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    schema,
                    "Payload index ensured"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::warn!(collection = collection_name, field, schema, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    /// Insert or replace a single point, waiting for the write to apply.
    pub async fn upsert_point(
        &self,
        collection_name: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "points": [
                {
                    "id": id,
                    "vector": vector,
                    "payload": payload,
                }
            ]
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}/points"))
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, id, "Point upserted");
        })
        .await
    }

    /// Whether a point with `id` is stored in the collection.
    pub async fn point_exists(&self, collection_name: &str, id: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(
                Method::GET,
                &format!("collections/{collection_name}/points/{id}"),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            // Qdrant answers malformed ids with 400; those cannot exist either.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, id, error = %error, "Point lookup failed");
                Err(error)
            }
        }
    }

    /// Delete points by identifier, waiting for the write to apply.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        ids: &[&str],
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": ids }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, count = ids.len(), "Points deleted");
        })
        .await
    }

    /// Fetch up to `limit` points matching `filter`, ordered by `order_field` descending.
    ///
    /// Ordering needs a payload index on `order_field`; points without the field are skipped.
    pub async fn scroll_latest(
        &self,
        collection: &str,
        filter: Option<Value>,
        order_field: &str,
        limit: usize,
    ) -> Result<Vec<StoredPoint>, QdrantError> {
        let body = json!({
            "filter": filter.unwrap_or_else(|| json!({ "must": [] })),
            "order_by": { "key": order_field, "direction": "desc" },
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/scroll"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection, error = %error, "Failed to scroll payloads");
            return Err(error);
        }

        let ScrollResponse { result } = response.json().await?;
        let points: Vec<StoredPoint> = result
            .points
            .into_iter()
            .filter_map(|point| match (point.id, point.payload) {
                (Some(id), Some(payload)) => Some(StoredPoint {
                    id: stringify_point_id(id),
                    payload,
                }),
                _ => None,
            })
            .collect();
        tracing::debug!(collection, count = points.len(), limit, "Scrolled latest points");
        Ok(points)
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
