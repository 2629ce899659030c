//! HTTP surface for Lexbrief.
//!
//! - `POST /summarize` and `POST /summarize-file` – Stitched summary plus outcome/judge
//!   heuristics for raw text or an uploaded PDF, image, or text file.
//! - `POST /answer` and `POST /answer-file` – Extractive answer to a question about raw text or
//!   an uploaded file. Long documents are reduced to their most relevant sentences first.
//! - `POST /save-summary`, `POST /save-answer` – Persist results (form fields).
//! - `GET /summaries`, `GET /answers` – Saved records, newest first, optionally `?user=` and
//!   `?limit=` (default 50, at most 500).
//! - `DELETE /summaries/:id`, `DELETE /answers/:id` – Remove a saved record.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog.
//!
//! Errors are returned as plain text with a status code chosen by failure kind.

use crate::history::{DEFAULT_LIST_LIMIT, HistoryEntry, HistoryKind, NewAnswer, NewSummary};
use crate::metrics::MetricsSnapshot;
use crate::processing::{Answer, LegalApi, ProcessingError, SummaryOutcome, Upload};
use axum::{
    Form, Json, RequestExt, Router, async_trait,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Largest accepted request body; uploads are held in memory.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: LegalApi + 'static,
{
    Router::new()
        .route("/summarize", post(summarize::<S>))
        .route("/summarize-file", post(summarize_file::<S>))
        .route("/answer", post(answer::<S>))
        .route("/answer-file", post(answer_file::<S>))
        .route("/save-summary", post(save_summary::<S>))
        .route("/save-answer", post(save_answer::<S>))
        .route("/summaries", get(list_summaries::<S>))
        .route("/summaries/:id", delete(delete_summary::<S>))
        .route("/answers", get(list_answers::<S>))
        .route("/answers/:id", delete(delete_answer::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Request body for `POST /summarize`.
#[derive(Deserialize)]
struct SummarizeRequest {
    text: String,
}

/// Summarize raw text.
async fn summarize<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummaryOutcome>, AppError>
where
    S: LegalApi,
{
    let text = request.text.trim().to_string();
    let outcome = service.summarize(text).await?;
    Ok(Json(outcome))
}

/// Extract an uploaded file's text and summarize it.
async fn summarize_file<S>(
    State(service): State<Arc<S>>,
    mut form: FormFields,
) -> Result<Json<SummaryOutcome>, AppError>
where
    S: LegalApi,
{
    let upload = form.take_upload()?;
    let text = service.extract_upload(upload).await?;
    let outcome = service.summarize(text).await?;
    Ok(Json(outcome))
}

/// Request body for `POST /answer`.
#[derive(Deserialize)]
struct AnswerRequest {
    text: String,
    question: String,
}

/// Answer a question about raw text.
async fn answer<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<Answer>, AppError>
where
    S: LegalApi,
{
    let text = request.text.trim().to_string();
    let question = request.question.trim().to_string();
    let answer = service.answer(text, question).await?;
    Ok(Json(answer))
}

/// Answer a question about an uploaded file.
async fn answer_file<S>(
    State(service): State<Arc<S>>,
    mut form: FormFields,
) -> Result<Json<Answer>, AppError>
where
    S: LegalApi,
{
    let question = form.required("question")?.trim().to_string();
    let upload = form.take_upload()?;
    let text = service.extract_upload(upload).await?;
    let answer = service.answer(text, question).await?;
    Ok(Json(answer))
}

/// Response body for save and delete operations.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    id: String,
}

/// Persist a summary from form fields `text`, `summary`, and optional `user`, `filename`.
async fn save_summary<S>(
    State(service): State<Arc<S>>,
    mut form: FormFields,
) -> Result<Json<StatusResponse>, AppError>
where
    S: LegalApi,
{
    let record = NewSummary {
        text: form.required("text")?,
        summary: form.required("summary")?,
        user: form.optional("user"),
        filename: form.optional("filename"),
    };
    let id = service.save_summary(record).await?;
    Ok(Json(StatusResponse { status: "saved", id }))
}

/// Persist an answer from form fields `question`, `answer`, and optional `user`, `filename`.
async fn save_answer<S>(
    State(service): State<Arc<S>>,
    mut form: FormFields,
) -> Result<Json<StatusResponse>, AppError>
where
    S: LegalApi,
{
    let record = NewAnswer {
        question: form.required("question")?,
        answer: form.required("answer")?,
        user: form.optional("user"),
        filename: form.optional("filename"),
    };
    let id = service.save_answer(record).await?;
    Ok(Json(StatusResponse { status: "saved", id }))
}

/// Query string accepted by the listing endpoints.
#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Response body for the listing endpoints.
#[derive(Serialize)]
struct HistoryResponse {
    items: Vec<HistoryEntry>,
}

async fn list_summaries<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError>
where
    S: LegalApi,
{
    list_history(service.as_ref(), HistoryKind::Summaries, query).await
}

async fn list_answers<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError>
where
    S: LegalApi,
{
    list_history(service.as_ref(), HistoryKind::Answers, query).await
}

async fn list_history<S>(
    service: &S,
    kind: HistoryKind,
    query: HistoryQuery,
) -> Result<Json<HistoryResponse>, AppError>
where
    S: LegalApi,
{
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let items = service.list_history(kind, query.user, limit).await?;
    tracing::debug!(collection = kind.collection(), count = items.len(), "Listed history");
    Ok(Json(HistoryResponse { items }))
}

async fn delete_summary<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError>
where
    S: LegalApi,
{
    service
        .delete_history(HistoryKind::Summaries, id.clone())
        .await?;
    Ok(Json(StatusResponse {
        status: "deleted",
        id,
    }))
}

async fn delete_answer<S>(
    State(service): State<Arc<S>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError>
where
    S: LegalApi,
{
    service
        .delete_history(HistoryKind::Answers, id.clone())
        .await?;
    Ok(Json(StatusResponse {
        status: "deleted",
        id,
    }))
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: LegalApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Summarize legal text window by window, then stitch. Response returns { \"summary\": string, \"decision\": { \"outcome\": string|null, \"judge\": string|null } }.",
                request_example: Some(json!({ "text": "Judgment text" })),
            },
            CommandDescriptor {
                name: "summarize_file",
                method: "POST",
                path: "/summarize-file",
                description: "Multipart upload (field `file`) of a PDF, image, or text file; same response as summarize.",
                request_example: None,
            },
            CommandDescriptor {
                name: "answer",
                method: "POST",
                path: "/answer",
                description: "Extractive answer to a question about the text. Response returns { \"answer\": string, \"score\": number }.",
                request_example: Some(json!({
                    "text": "Judgment text",
                    "question": "Who is the lessee?"
                })),
            },
            CommandDescriptor {
                name: "answer_file",
                method: "POST",
                path: "/answer-file",
                description: "Multipart upload (fields `file`, `question`); same response as answer.",
                request_example: None,
            },
            CommandDescriptor {
                name: "save_summary",
                method: "POST",
                path: "/save-summary",
                description: "Save a summary from form fields. Response returns { \"status\": \"saved\", \"id\": string }.",
                request_example: Some(json!({
                    "text": "Judgment text",
                    "summary": "Summary text",
                    "user": "optional-user",
                    "filename": "text"
                })),
            },
            CommandDescriptor {
                name: "save_answer",
                method: "POST",
                path: "/save-answer",
                description: "Save a question and its answer from form fields.",
                request_example: Some(json!({
                    "question": "Who is the lessee?",
                    "answer": "The tenant",
                    "user": "optional-user",
                    "filename": "text"
                })),
            },
            CommandDescriptor {
                name: "list_summaries",
                method: "GET",
                path: "/summaries",
                description: "Saved summaries, newest first. Optional `user` and `limit` (default 50, max 500) query parameters.",
                request_example: None,
            },
            CommandDescriptor {
                name: "list_answers",
                method: "GET",
                path: "/answers",
                description: "Saved answers, newest first. Optional `user` and `limit` (default 50, max 500) query parameters.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_summary",
                method: "DELETE",
                path: "/summaries/:id",
                description: "Delete a saved summary.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_answer",
                method: "DELETE",
                path: "/answers/:id",
                description: "Delete a saved answer.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Text fields and an optional file collected from a multipart or urlencoded body.
struct FormFields {
    fields: HashMap<String, String>,
    upload: Option<Upload>,
}

impl FormFields {
    fn required(&mut self, name: &str) -> Result<String, AppError> {
        self.fields
            .remove(name)
            .ok_or_else(|| AppError::BadRequest(format!("missing form field `{name}`")))
    }

    fn optional(&mut self, name: &str) -> Option<String> {
        self.fields
            .remove(name)
            .filter(|value| !value.trim().is_empty())
    }

    fn take_upload(&mut self) -> Result<Upload, AppError> {
        self.upload
            .take()
            .ok_or_else(|| AppError::BadRequest("missing file upload".into()))
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut fields = HashMap::new();
        let mut upload = None;
        while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            if file_name.is_some() || name == "file" {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_request)?;
                upload = Some(Upload {
                    bytes: bytes.to_vec(),
                    content_type,
                    file_name,
                });
            } else {
                let value = field.text().await.map_err(bad_request)?;
                fields.insert(name, value);
            }
        }
        Ok(Self { fields, upload })
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(bad_request)?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = req
                .extract::<Form<HashMap<String, String>>, _>()
                .await
                .map_err(bad_request)?;
            Ok(Self {
                fields,
                upload: None,
            })
        } else {
            Err(AppError::BadRequest(format!(
                "expected multipart/form-data or application/x-www-form-urlencoded, got `{content_type}`"
            )))
        }
    }
}

fn bad_request(err: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(err.to_string())
}

enum AppError {
    Processing(ProcessingError),
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Processing(ProcessingError::Extraction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Processing(ProcessingError::ModelInference(_))
            | Self::Processing(ProcessingError::Storage(_)) => StatusCode::BAD_GATEWAY,
            Self::Processing(ProcessingError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Processing(ProcessingError::Chunking(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Processing(err) => err.to_string(),
            Self::BadRequest(message) => message,
        };
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "Request failed");
        } else {
            tracing::warn!(%status, error = %message, "Request rejected");
        }
        (status, message).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}
