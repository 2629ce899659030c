//! Context selection for question answering.
//!
//! Long documents are reduced to the sentences most relevant to the question before the QA
//! model sees them. Comparative questions widen the window and always retrieve from the full
//! document. Questions about section 108 get the statutory text appended.

use crate::config::Config;
use crate::embedding::Embedder;

use super::retrieval::{RetrievalDecision, retrieve_relevant};
use super::tokenizer::Tokenizer;
use super::types::ProcessingError;

/// Extra sentences kept for comparative questions.
pub const COMPARATIVE_TOP_K_BONUS: usize = 5;
/// Lowercase phrases marking a comparative question.
pub const COMPARATIVE_TRIGGERS: [&str; 2] = ["same as", "difference between"];
/// Lowercase phrase that pulls in the statutory excerpt.
pub const STATUTE_TRIGGER: &str = "section 108";
/// Definition appended to the context when the question cites section 108.
pub const SECTION_108_EXCERPT: &str = "\nSection 108 of the Transfer of Property Act: \
The lessee may transfer absolutely or by way of mortgage or sub-lease the whole or any part \
of his interest in the property, unless a contract prohibits it.";

/// Where the QA context comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPolicy {
    /// Pass the whole document.
    UseFullText,
    /// Retrieve from the whole document, keeping `top_k` sentences.
    UseRetrieved {
        /// Sentences to keep.
        top_k: usize,
    },
}

/// Thresholds steering [`ContextPolicy`] selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerPolicy {
    /// Document token count above which retrieval is used.
    pub token_threshold: usize,
    /// Sentences kept for ordinary questions.
    pub top_k: usize,
}

impl Default for AnswerPolicy {
    fn default() -> Self {
        Self {
            token_threshold: 450,
            top_k: super::retrieval::DEFAULT_TOP_K,
        }
    }
}

impl AnswerPolicy {
    /// Derive the policy from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_threshold: config.retrieval_token_threshold,
            top_k: config.retrieval_top_k,
        }
    }

    /// Pick the context source for a document of `token_count` tokens.
    ///
    /// A comparative question overrides the token-budget reduction rather than composing with
    /// it: retrieval runs once against the full text with the wider window.
    pub fn context_policy(&self, token_count: usize, question: &str) -> ContextPolicy {
        if is_comparative(question) {
            ContextPolicy::UseRetrieved {
                top_k: self.top_k + COMPARATIVE_TOP_K_BONUS,
            }
        } else if token_count > self.token_threshold {
            ContextPolicy::UseRetrieved { top_k: self.top_k }
        } else {
            ContextPolicy::UseFullText
        }
    }
}

/// Whether the question asks to compare two things.
pub fn is_comparative(question: &str) -> bool {
    let lowered = question.to_lowercase();
    COMPARATIVE_TRIGGERS
        .iter()
        .any(|trigger| lowered.contains(trigger))
}

/// Whether the question cites section 108.
pub fn cites_statute(question: &str) -> bool {
    question.to_lowercase().contains(STATUTE_TRIGGER)
}

/// Context handed to the QA model and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerContext {
    /// Final context text.
    pub text: String,
    /// Policy selected for the request.
    pub policy: ContextPolicy,
    /// Whether retrieval actually reduced the text.
    pub retrieved: bool,
    /// Whether the statutory excerpt was appended.
    pub statute_appended: bool,
}

/// Build the QA context for `question` over the full document `text`.
pub async fn build_answer_context(
    text: &str,
    question: &str,
    tokenizer: &dyn Tokenizer,
    embedder: &dyn Embedder,
    policy: &AnswerPolicy,
) -> Result<AnswerContext, ProcessingError> {
    let token_count = tokenizer.count(text)?;
    let context_policy = policy.context_policy(token_count, question);
    tracing::debug!(token_count, policy = ?context_policy, "Selected answer context policy");

    let (mut context, retrieved) = match context_policy {
        ContextPolicy::UseFullText => (text.to_string(), false),
        ContextPolicy::UseRetrieved { top_k } => {
            let relevant = retrieve_relevant(text, question, top_k, embedder).await?;
            let retrieved = matches!(relevant.decision, RetrievalDecision::UseRetrieved { .. });
            (relevant.text, retrieved)
        }
    };

    let statute_appended = cites_statute(question);
    if statute_appended {
        context.push_str(SECTION_108_EXCERPT);
    }

    Ok(AnswerContext {
        text: context,
        policy: context_policy,
        retrieved,
        statute_appended,
    })
}
