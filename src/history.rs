//! Saved summaries and answers, stored as Qdrant points.
//!
//! Each record kind lives in its own collection. A point's vector embeds the record's main
//! text (the summary or the question) and its payload holds the record fields.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::embedding::Embedder;
use crate::inference::InferenceError;
use crate::processing::ProcessingError;
use crate::qdrant::QdrantService;
use crate::qdrant::payload::{
    compute_text_hash, current_timestamp_rfc3339, generate_point_id, keyword_filter,
};

const USER_FIELD: &str = "user";
const CREATED_AT_FIELD: &str = "created_at";

/// Records returned by a listing when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Largest page a listing will return.
pub const MAX_LIST_LIMIT: usize = 500;

/// Record kinds kept in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    /// Saved document summaries.
    Summaries,
    /// Saved question/answer pairs.
    Answers,
}

impl HistoryKind {
    /// Every kind, in collection creation order.
    pub const ALL: [Self; 2] = [Self::Summaries, Self::Answers];

    /// Qdrant collection holding this kind.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Summaries => "summaries",
            Self::Answers => "answers",
        }
    }
}

/// Summary submitted for saving.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewSummary {
    /// Source document text.
    pub text: String,
    /// Summary produced for the text.
    pub summary: String,
    /// Optional owner label.
    #[serde(default)]
    pub user: Option<String>,
    /// Optional source file name; `"text"` for typed input.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Answer submitted for saving.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewAnswer {
    /// Question asked.
    pub question: String,
    /// Answer returned.
    pub answer: String,
    /// Optional owner label.
    #[serde(default)]
    pub user: Option<String>,
    /// Optional source file name; `"text"` for typed input.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Stored record as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Point identifier.
    pub id: String,
    /// Stored payload fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Qdrant-backed store for saved results.
pub struct HistoryStore {
    qdrant: QdrantService,
    embedder: Arc<dyn Embedder>,
    vector_size: u64,
}

impl HistoryStore {
    /// Wrap a Qdrant client; `vector_size` must match what `embedder` produces.
    pub fn new(qdrant: QdrantService, embedder: Arc<dyn Embedder>, vector_size: u64) -> Self {
        Self {
            qdrant,
            embedder,
            vector_size,
        }
    }

    /// Create the history collections and their payload indexes when missing.
    pub async fn ensure_collections(&self) -> Result<(), ProcessingError> {
        for kind in HistoryKind::ALL {
            let collection = kind.collection();
            self.qdrant
                .create_collection_if_not_exists(collection, self.vector_size)
                .await?;
            self.qdrant
                .ensure_payload_indexes(
                    collection,
                    &[(USER_FIELD, "keyword"), (CREATED_AT_FIELD, "datetime")],
                )
                .await?;
        }
        Ok(())
    }

    /// Persist a summary and return its identifier.
    pub async fn save_summary(&self, record: NewSummary) -> Result<String, ProcessingError> {
        let payload = json!({
            "text": record.text,
            "summary": record.summary,
            "text_hash": compute_text_hash(&record.text),
            "user": record.user,
            "filename": record.filename,
            "created_at": current_timestamp_rfc3339(),
        });
        self.save(HistoryKind::Summaries, record.summary, payload)
            .await
    }

    /// Persist a question/answer pair and return its identifier.
    pub async fn save_answer(&self, record: NewAnswer) -> Result<String, ProcessingError> {
        let payload = json!({
            "question": record.question,
            "answer": record.answer,
            "user": record.user,
            "filename": record.filename,
            "created_at": current_timestamp_rfc3339(),
        });
        self.save(HistoryKind::Answers, record.question, payload)
            .await
    }

    async fn save(
        &self,
        kind: HistoryKind,
        embed_text: String,
        payload: Value,
    ) -> Result<String, ProcessingError> {
        let vector = self
            .embedder
            .embed(vec![embed_text])
            .await?
            .pop()
            .ok_or_else(|| InferenceError::InvalidResponse("embedder returned no vector".into()))?;
        let id = generate_point_id();
        self.qdrant
            .upsert_point(kind.collection(), &id, vector, payload)
            .await?;
        tracing::info!(collection = kind.collection(), id = %id, "Saved history record");
        Ok(id)
    }

    /// List up to `limit` records newest first, optionally restricted to one user.
    ///
    /// `limit` is clamped to `1..=MAX_LIST_LIMIT`. Ordering happens in Qdrant over the
    /// `created_at` datetime index.
    pub async fn list(
        &self,
        kind: HistoryKind,
        user: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, ProcessingError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let points = self
            .qdrant
            .scroll_latest(
                kind.collection(),
                keyword_filter(USER_FIELD, user),
                CREATED_AT_FIELD,
                limit,
            )
            .await?;
        Ok(points
            .into_iter()
            .map(|point| HistoryEntry {
                id: point.id,
                fields: point.payload,
            })
            .collect())
    }

    /// Delete one record, failing with `NotFound` when it does not exist.
    pub async fn delete(&self, kind: HistoryKind, id: &str) -> Result<(), ProcessingError> {
        let collection = kind.collection();
        if !self.qdrant.point_exists(collection, id).await? {
            return Err(ProcessingError::NotFound(format!("{collection}/{id}")));
        }
        self.qdrant.delete_points(collection, &[id]).await?;
        tracing::info!(collection, id, "Deleted history record");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use httpmock::Method::{GET, POST, PUT};
    use httpmock::MockServer;

    pub(crate) fn store(server: &MockServer) -> HistoryStore {
        let qdrant = QdrantService::with_base_url(&server.base_url(), None).expect("client");
        HistoryStore::new(qdrant, Arc::new(HashedEmbedder::new(8)), 8)
    }

    #[tokio::test]
    async fn saving_a_summary_upserts_payload_and_vector() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/summaries/points")
                    .query_param("wait", "true")
                    .json_body_partial(
                        json!({
                            "points": [{
                                "payload": {
                                    "text": "Full judgment.",
                                    "summary": "Short.",
                                    "user": "asha",
                                    "filename": "text",
                                    "text_hash": compute_text_hash("Full judgment.")
                                }
                            }]
                        })
                        .to_string(),
                    );
                then.status(200).json_body(json!({ "result": { "status": "completed" } }));
            })
            .await;

        let id = store(&server)
            .save_summary(NewSummary {
                text: "Full judgment.".into(),
                summary: "Short.".into(),
                user: Some("asha".into()),
                filename: Some("text".into()),
            })
            .await
            .expect("saved");

        upsert.assert();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn listing_filters_by_user_and_asks_for_newest_first() {
        let server = MockServer::start_async().await;
        let scroll = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/answers/points/scroll")
                    .json_body_partial(
                        r#"{
                            "filter": { "must": [{ "key": "user", "match": { "value": "asha" } }] },
                            "order_by": { "key": "created_at", "direction": "desc" },
                            "limit": 2
                        }"#,
                    );
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "new", "payload": { "question": "q2", "created_at": "2024-03-05T10:00:00.5Z" } },
                            { "id": "old", "payload": { "question": "q1", "created_at": "2024-01-01T00:00:00Z" } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let entries = store(&server)
            .list(HistoryKind::Answers, Some("asha"), 2)
            .await
            .expect("entries");

        scroll.assert();
        let ids: Vec<_> = entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let serialized = serde_json::to_value(&entries[0]).expect("json");
        assert_eq!(serialized["id"], "new");
        assert_eq!(serialized["question"], "q2");
    }

    #[tokio::test]
    async fn listing_clamps_the_requested_limit() {
        let server = MockServer::start_async().await;
        let capped = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/summaries/points/scroll")
                    .json_body_partial(format!(r#"{{ "limit": {MAX_LIST_LIMIT} }}"#));
                then.status(200).json_body(json!({ "result": { "points": [] } }));
            })
            .await;
        let floor = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/summaries/points/scroll")
                    .json_body_partial(r#"{ "limit": 1 }"#);
                then.status(200).json_body(json!({ "result": { "points": [] } }));
            })
            .await;

        let store = store(&server);
        let entries = store
            .list(HistoryKind::Summaries, None, 100_000)
            .await
            .expect("capped");
        assert!(entries.is_empty());
        store
            .list(HistoryKind::Summaries, None, 0)
            .await
            .expect("floored");

        capped.assert();
        floor.assert();
    }

    #[tokio::test]
    async fn deleting_a_missing_record_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/summaries/points/nope");
                then.status(404).json_body(json!({ "status": { "error": "Not found" } }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/summaries/points/delete");
                then.status(200);
            })
            .await;

        let error = store(&server)
            .delete(HistoryKind::Summaries, "nope")
            .await
            .expect_err("missing");
        assert!(matches!(error, ProcessingError::NotFound(_)));
        delete.assert_hits(0);
    }

    #[tokio::test]
    async fn deleting_an_existing_record_removes_the_point() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/answers/points/abc");
                then.status(200).json_body(json!({ "result": { "id": "abc" } }));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/answers/points/delete")
                    .json_body(json!({ "points": ["abc"] }));
                then.status(200).json_body(json!({ "result": { "status": "completed" } }));
            })
            .await;

        store(&server)
            .delete(HistoryKind::Answers, "abc")
            .await
            .expect("deleted");
        delete.assert();
    }
}
