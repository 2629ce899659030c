//! Request-level orchestration shared by every HTTP handler.

use crate::{
    answering::{QuestionAnswerer, get_question_answerer},
    config::get_config,
    embedding::{Embedder, get_embedder},
    history::{HistoryEntry, HistoryKind, HistoryStore, NewAnswer, NewSummary},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        answer::{AnswerPolicy, build_answer_context},
        decision::extract_decision,
        extract::extract_text,
        summarize::{SummaryParams, summarize_stitched},
        tokenizer::{Tokenizer, get_tokenizer},
        types::{Answer, ChunkingError, ProcessingError, SummaryOutcome, Upload},
    },
    qdrant::QdrantService,
    summarization::{Summarizer, get_summarizer},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Owns the model adapters, history store, and metrics used to serve requests.
///
/// Models are built once at startup and shared read-only across concurrent requests. Construct
/// the service near process start and share it through an `Arc`.
pub struct LegalService {
    tokenizer: Box<dyn Tokenizer>,
    summarizer: Box<dyn Summarizer>,
    answerer: Box<dyn QuestionAnswerer>,
    embedder: Arc<dyn Embedder>,
    history: HistoryStore,
    summary_params: SummaryParams,
    answer_policy: AnswerPolicy,
    ocr_command: String,
    metrics: Arc<PipelineMetrics>,
}

/// Model and storage handles assembled by the caller.
pub struct ServiceParts {
    /// Tokenizer used for windows and token budgets.
    pub tokenizer: Box<dyn Tokenizer>,
    /// Summarization model.
    pub summarizer: Box<dyn Summarizer>,
    /// Extractive QA model.
    pub answerer: Box<dyn QuestionAnswerer>,
    /// Sentence embedder, shared with the history store.
    pub embedder: Arc<dyn Embedder>,
    /// Saved-record store.
    pub history: HistoryStore,
    /// Window geometry and summary length bounds.
    pub summary_params: SummaryParams,
    /// QA context thresholds.
    pub answer_policy: AnswerPolicy,
    /// OCR executable for image uploads.
    pub ocr_command: String,
}

/// Operations exposed to the HTTP surface.
#[async_trait]
pub trait LegalApi: Send + Sync {
    /// Summarize a document and pull decision heuristics from it.
    async fn summarize(&self, text: String) -> Result<SummaryOutcome, ProcessingError>;

    /// Answer a question about a document.
    async fn answer(&self, text: String, question: String) -> Result<Answer, ProcessingError>;

    /// Extract plain text from an uploaded file.
    async fn extract_upload(&self, upload: Upload) -> Result<String, ProcessingError>;

    /// Persist a summary, returning the new record id.
    async fn save_summary(&self, record: NewSummary) -> Result<String, ProcessingError>;

    /// Persist a question/answer pair, returning the new record id.
    async fn save_answer(&self, record: NewAnswer) -> Result<String, ProcessingError>;

    /// List up to `limit` saved records of one kind, newest first.
    async fn list_history(
        &self,
        kind: HistoryKind,
        user: Option<String>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, ProcessingError>;

    /// Remove a saved record.
    async fn delete_history(&self, kind: HistoryKind, id: String) -> Result<(), ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl LegalService {
    /// Build the service from the loaded configuration and ensure history collections exist.
    pub async fn new() -> Result<Self, ProcessingError> {
        let config = get_config();
        tracing::info!(
            summarization_model = %config.summarization_model,
            qa_model = %config.qa_model,
            "Initializing model adapters"
        );
        let tokenizer = tokio::task::spawn_blocking(move || get_tokenizer(config))
            .await
            .map_err(|error| ChunkingError::Tokenizer {
                encoding: config.tokenizer.clone(),
                source: error.into(),
            })??;
        let summarizer = get_summarizer(config)?;
        let answerer = get_question_answerer(config)?;
        let embedder: Arc<dyn Embedder> = Arc::from(get_embedder(config)?);

        let qdrant = QdrantService::new()?;
        let history = HistoryStore::new(
            qdrant,
            Arc::clone(&embedder),
            config.embedding_dimension as u64,
        );
        history.ensure_collections().await?;
        tracing::debug!("History collections ready");

        Ok(Self::from_parts(ServiceParts {
            tokenizer,
            summarizer,
            answerer,
            embedder,
            history,
            summary_params: SummaryParams::from_config(config)?,
            answer_policy: AnswerPolicy::from_config(config),
            ocr_command: config.ocr_command.clone(),
        }))
    }

    /// Assemble a service from prepared parts.
    pub fn from_parts(parts: ServiceParts) -> Self {
        Self {
            tokenizer: parts.tokenizer,
            summarizer: parts.summarizer,
            answerer: parts.answerer,
            embedder: parts.embedder,
            history: parts.history,
            summary_params: parts.summary_params,
            answer_policy: parts.answer_policy,
            ocr_command: parts.ocr_command,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Summarize `text` through the window pipeline and attach decision heuristics.
    pub async fn summarize(&self, text: String) -> Result<SummaryOutcome, ProcessingError> {
        let stitched = summarize_stitched(
            &text,
            self.tokenizer.as_ref(),
            self.summarizer.as_ref(),
            &self.summary_params,
        )
        .await?;
        let decision = extract_decision(&text);

        self.metrics.record_summary(stitched.chunk_count as u64);
        tracing::info!(
            chars = text.len(),
            chunks = stitched.chunk_count,
            truncated = stitched.truncated,
            outcome = ?decision.outcome,
            judge = ?decision.judge,
            "Document summarized"
        );

        Ok(SummaryOutcome {
            summary: stitched.summary,
            decision,
            chunk_count: stitched.chunk_count,
            stitched_truncated: stitched.truncated,
        })
    }

    /// Answer `question` from `text`, reducing the context first when the policy asks for it.
    pub async fn answer(&self, text: String, question: String) -> Result<Answer, ProcessingError> {
        let context = build_answer_context(
            &text,
            &question,
            self.tokenizer.as_ref(),
            self.embedder.as_ref(),
            &self.answer_policy,
        )
        .await?;
        let answer = self.answerer.answer(&question, &context.text).await?;
        if answer.answer.is_empty() {
            tracing::warn!("Question answering returned an empty span");
        }

        self.metrics.record_answer(context.retrieved);
        tracing::info!(
            policy = ?context.policy,
            retrieved = context.retrieved,
            statute_appended = context.statute_appended,
            context_chars = context.text.len(),
            score = answer.score,
            "Question answered"
        );
        Ok(answer)
    }

    /// Extract text from an uploaded file.
    pub async fn extract_upload(&self, upload: Upload) -> Result<String, ProcessingError> {
        Ok(extract_text(upload, &self.ocr_command).await?)
    }

    /// Save a summary to history.
    pub async fn save_summary(&self, record: NewSummary) -> Result<String, ProcessingError> {
        let id = self.history.save_summary(record).await?;
        self.metrics.record_save();
        Ok(id)
    }

    /// Save a question/answer pair to history.
    pub async fn save_answer(&self, record: NewAnswer) -> Result<String, ProcessingError> {
        let id = self.history.save_answer(record).await?;
        self.metrics.record_save();
        Ok(id)
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl LegalApi for LegalService {
    async fn summarize(&self, text: String) -> Result<SummaryOutcome, ProcessingError> {
        LegalService::summarize(self, text).await
    }

    async fn answer(&self, text: String, question: String) -> Result<Answer, ProcessingError> {
        LegalService::answer(self, text, question).await
    }

    async fn extract_upload(&self, upload: Upload) -> Result<String, ProcessingError> {
        LegalService::extract_upload(self, upload).await
    }

    async fn save_summary(&self, record: NewSummary) -> Result<String, ProcessingError> {
        LegalService::save_summary(self, record).await
    }

    async fn save_answer(&self, record: NewAnswer) -> Result<String, ProcessingError> {
        LegalService::save_answer(self, record).await
    }

    async fn list_history(
        &self,
        kind: HistoryKind,
        user: Option<String>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, ProcessingError> {
        self.history.list(kind, user.as_deref(), limit).await
    }

    async fn delete_history(&self, kind: HistoryKind, id: String) -> Result<(), ProcessingError> {
        self.history.delete(kind, &id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        LegalService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceError;
    use crate::processing::answer::SECTION_108_EXCERPT;
    use crate::processing::chunking::ChunkWindow;
    use crate::processing::retrieval::tests::{KeywordEmbedder, numbered_sentences};
    use crate::processing::summarize::tests::{RecordingSummarizer, WordTokenizer};
    use crate::summarization::DecodingParams;
    use httpmock::MockServer;
    use std::sync::Mutex;

    /// Answers with the first word of the context and records every context it saw.
    #[derive(Default)]
    struct EchoAnswerer {
        contexts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl QuestionAnswerer for EchoAnswerer {
        async fn answer(&self, _question: &str, context: &str) -> Result<Answer, InferenceError> {
            self.contexts
                .lock()
                .expect("contexts lock")
                .push(context.to_string());
            Ok(Answer {
                answer: context.split_whitespace().next().unwrap_or_default().to_string(),
                score: 0.75,
            })
        }
    }

    fn service(server: &MockServer, contexts: Arc<Mutex<Vec<String>>>) -> LegalService {
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new("lease"));
        LegalService::from_parts(ServiceParts {
            tokenizer: Box::new(WordTokenizer::default()),
            summarizer: Box::new(RecordingSummarizer::default()),
            answerer: Box::new(EchoAnswerer { contexts }),
            embedder: Arc::clone(&embedder),
            history: HistoryStore::new(
                QdrantService::with_base_url(&server.base_url(), None).expect("client"),
                embedder,
                2,
            ),
            summary_params: SummaryParams {
                window: ChunkWindow::new(500, 50).expect("window"),
                max_chunk_summary_tokens: 120,
                min_final_tokens: 480,
                max_final_tokens: 500,
                decoding: DecodingParams::default(),
            },
            answer_policy: AnswerPolicy::default(),
            ocr_command: "tesseract".into(),
        })
    }

    #[tokio::test]
    async fn summarize_attaches_decision_and_records_metrics() {
        let server = MockServer::start_async().await;
        let service = service(&server, Arc::default());
        let text = format!(
            "Before Justice Ravi Kumar. {} Accordingly the appeal is dismissed with costs.",
            "filler ".repeat(880)
        );

        let outcome = service.summarize(text).await.expect("summary");

        assert_eq!(outcome.chunk_count, 2);
        assert_eq!(outcome.decision.judge.as_deref(), Some("Justice Ravi Kumar"));
        assert_eq!(
            outcome.decision.outcome.as_deref(),
            Some("appeal is dismissed")
        );
        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_summarized, 1);
        assert_eq!(snapshot.chunks_summarized, 2);
    }

    #[tokio::test]
    async fn answer_passes_reduced_context_and_statute_to_the_model() {
        let server = MockServer::start_async().await;
        let contexts = Arc::default();
        let service = service(&server, Arc::clone(&contexts));
        let text = numbered_sentences(120, 3, "lease");

        let answer = service
            .answer(text, "Does section 108 govern the lease?".into())
            .await
            .expect("answer");

        assert_eq!(answer.answer, "Sentence");
        let seen = contexts.lock().expect("contexts").clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("Sentence 0 mentions lease."));
        assert!(seen[0].ends_with(SECTION_108_EXCERPT));
        assert_eq!(seen[0].matches("Transfer of Property Act").count(), 1);

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.questions_answered, 1);
        assert_eq!(snapshot.retrievals_performed, 1);
    }

    #[tokio::test]
    async fn short_documents_reach_the_model_unchanged() {
        let server = MockServer::start_async().await;
        let contexts = Arc::default();
        let service = service(&server, Arc::clone(&contexts));

        service
            .answer("The lessee is Asha. The lessor is Ravi.".into(), "Who is the lessee?".into())
            .await
            .expect("answer");

        let seen = contexts.lock().expect("contexts").clone();
        assert_eq!(seen, vec!["The lessee is Asha. The lessor is Ravi.".to_string()]);
        assert_eq!(service.metrics_snapshot().retrievals_performed, 0);
    }
}
