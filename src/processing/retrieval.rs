//! Sentence-level semantic retrieval.
//!
//! A document is split into sentences, each sentence and the query are embedded, and the
//! `top_k` sentences closest to the query by cosine similarity are kept. Selected sentences
//! are emitted in document order, not rank order, so the reduced context still reads as
//! prose. Small documents skip retrieval entirely.

use crate::embedding::Embedder;
use crate::inference::InferenceError;
use regex::Regex;
use std::sync::LazyLock;

/// Sentences kept by default when a context is reduced.
pub const DEFAULT_TOP_K: usize = 20;

static SENTENCE_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!]\s+").expect("sentence boundary regex is valid"));

/// Whether a document is worth reducing for a given `top_k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalDecision {
    /// The document is already small; keep it whole.
    UseFullText,
    /// Keep the `top_k` most similar sentences.
    UseRetrieved {
        /// Sentences to keep.
        top_k: usize,
    },
}

/// Skip retrieval when `sentence_count <= 1.5 * top_k`.
pub fn retrieval_decision(sentence_count: usize, top_k: usize) -> RetrievalDecision {
    if top_k == 0 || sentence_count * 2 <= top_k * 3 {
        RetrievalDecision::UseFullText
    } else {
        RetrievalDecision::UseRetrieved { top_k }
    }
}

/// Text produced by [`retrieve_relevant`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelevantContext {
    /// Either the original text or the selected sentences joined by single spaces.
    pub text: String,
    /// Sentence count of the original document.
    pub sentence_count: usize,
    /// Branch taken for this document.
    pub decision: RetrievalDecision,
}

/// Split on whitespace that follows `.`, `?`, or `!`; punctuation stays with its sentence.
///
/// Text ending in punctuation plus whitespace yields a trailing empty segment.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY_RE.find_iter(text) {
        // The terminal punctuation is a single ASCII byte.
        let end = boundary.start() + 1;
        sentences.push(&text[start..end]);
        start = boundary.end();
    }
    sentences.push(&text[start..]);
    sentences
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let (mut dot, mut left_norm, mut right_norm) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

/// Indices of the `top_k` highest scores, returned in ascending index order.
///
/// Equal scores favour the earlier index.
pub fn select_top_k(scores: &[f32], top_k: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    ranked.truncate(top_k);
    ranked.sort_unstable();
    ranked
}

/// Reduce `text` to the sentences most similar to `query`.
pub async fn retrieve_relevant(
    text: &str,
    query: &str,
    top_k: usize,
    embedder: &dyn Embedder,
) -> Result<RelevantContext, InferenceError> {
    let sentences = split_sentences(text);
    let sentence_count = sentences.len();
    let decision = retrieval_decision(sentence_count, top_k);
    if decision == RetrievalDecision::UseFullText {
        tracing::debug!(sentence_count, top_k, "Document small enough; skipping retrieval");
        return Ok(RelevantContext {
            text: text.to_string(),
            sentence_count,
            decision,
        });
    }

    let mut inputs: Vec<String> = sentences.iter().map(|s| s.to_string()).collect();
    inputs.push(query.to_string());
    let mut vectors = embedder.embed(inputs).await?;
    if vectors.len() != sentence_count + 1 {
        return Err(InferenceError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            sentence_count + 1,
            vectors.len()
        )));
    }
    let query_vector = vectors.pop().unwrap_or_default();

    let scores: Vec<f32> = vectors
        .iter()
        .map(|vector| cosine_similarity(&query_vector, vector))
        .collect();
    let selected = select_top_k(&scores, top_k);
    let text = selected
        .iter()
        .map(|&index| sentences[index])
        .collect::<Vec<_>>()
        .join(" ");

    tracing::debug!(sentence_count, kept = selected.len(), "Retrieved relevant sentences");
    Ok(RelevantContext {
        text,
        sentence_count,
        decision,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Embeds a text as `[1, 0]` when it contains `keyword`, else `[0, 1]`; records inputs.
    pub(crate) struct KeywordEmbedder {
        pub(crate) keyword: &'static str,
        pub(crate) calls: Mutex<Vec<Vec<String>>>,
    }

    impl KeywordEmbedder {
        pub(crate) fn new(keyword: &'static str) -> Self {
            Self {
                keyword,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError> {
            let vectors = texts
                .iter()
                .map(|text| {
                    if text.contains(self.keyword) {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect();
            self.calls.lock().expect("calls lock").push(texts);
            Ok(vectors)
        }
    }

    pub(crate) fn numbered_sentences(count: usize, keyword_every: usize, keyword: &str) -> String {
        (0..count)
            .map(|i| {
                if keyword_every > 0 && i % keyword_every == 0 {
                    format!("Sentence {i} mentions {keyword}.")
                } else {
                    format!("Sentence {i} is filler.")
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn split_keeps_punctuation_and_drops_boundary_whitespace() {
        let sentences = split_sentences("First one. Second?  Third!\nFourth");
        assert_eq!(sentences, vec!["First one.", "Second?", "Third!", "Fourth"]);
    }

    #[test]
    fn split_ignores_punctuation_without_whitespace() {
        assert_eq!(split_sentences("Sec.108 applies"), vec!["Sec.108 applies"]);
        assert_eq!(split_sentences("Ends here. "), vec!["Ends here.", ""]);
    }

    #[test]
    fn decision_short_circuits_at_one_and_a_half_top_k() {
        assert_eq!(retrieval_decision(30, 20), RetrievalDecision::UseFullText);
        assert_eq!(
            retrieval_decision(31, 20),
            RetrievalDecision::UseRetrieved { top_k: 20 }
        );
        assert_eq!(retrieval_decision(37, 25), RetrievalDecision::UseFullText);
        assert_eq!(
            retrieval_decision(38, 25),
            RetrievalDecision::UseRetrieved { top_k: 25 }
        );
        assert_eq!(retrieval_decision(500, 0), RetrievalDecision::UseFullText);
    }

    #[test]
    fn top_k_selection_returns_document_order_and_prefers_earlier_ties() {
        let scores = [0.1, 0.9, 0.5, 0.9, 0.7];
        assert_eq!(select_top_k(&scores, 3), vec![1, 3, 4]);
        assert_eq!(select_top_k(&[0.2, 0.2, 0.2], 2), vec![0, 1]);
        assert_eq!(select_top_k(&scores, 10), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn small_documents_are_returned_unchanged() {
        let embedder = KeywordEmbedder::new("lease");
        let text = numbered_sentences(30, 3, "lease");
        let context = retrieve_relevant(&text, "lease terms", 20, &embedder)
            .await
            .expect("context");
        assert_eq!(context.text, text);
        assert_eq!(context.decision, RetrievalDecision::UseFullText);
        assert!(embedder.calls().is_empty());
    }

    #[tokio::test]
    async fn retrieved_sentences_keep_document_order() {
        let embedder = KeywordEmbedder::new("lease");
        let text = numbered_sentences(40, 4, "lease");
        let context = retrieve_relevant(&text, "what about the lease", 10, &embedder)
            .await
            .expect("context");

        let expected = (0..40)
            .step_by(4)
            .map(|i| format!("Sentence {i} mentions lease."))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(context.text, expected);
        assert_eq!(context.sentence_count, 40);

        let calls = embedder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 41);
        assert_eq!(calls[0][40], "what about the lease");
    }
}
