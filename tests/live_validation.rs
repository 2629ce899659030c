use std::{env, sync::Arc, sync::Once};

use lexbrief::{
    answering, config,
    embedding::HashedEmbedder,
    history::{DEFAULT_LIST_LIMIT, HistoryKind, HistoryStore, NewSummary},
    processing::{
        summarize::{SummaryParams, summarize_stitched},
        tokenizer::get_tokenizer,
    },
    qdrant::QdrantService,
    summarization,
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("INFERENCE_URL", "https://api-inference.huggingface.co");
        set_default_env("EMBEDDING_PROVIDER", "hashed");
        set_default_env("EMBEDDING_DIMENSION", "64");
        config::init_config().expect("live configuration");
    });
    config::get_config()
}

const JUDGMENT: &str = "Before Justice Ravi Kumar. The appellant took the premises on lease \
in 2004 and later sub-let a portion to the respondent. The lessor sued for eviction, arguing \
that the lease prohibited sub-letting. The trial court decreed the suit. On appeal, the \
appellant relied on section 108 of the Transfer of Property Act. We find no merit in the \
contention, since the lease deed expressly barred any transfer. The appeal is dismissed with \
costs.";

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_history_roundtrip() {
    let config = init_config_once();
    let qdrant = QdrantService::new().expect("qdrant client");
    let store = HistoryStore::new(
        qdrant,
        Arc::new(HashedEmbedder::new(config.embedding_dimension)),
        config.embedding_dimension as u64,
    );
    store.ensure_collections().await.expect("collections");

    let user = format!("live-{}", std::process::id());
    let id = store
        .save_summary(NewSummary {
            text: JUDGMENT.into(),
            summary: "Eviction upheld; appeal dismissed.".into(),
            user: Some(user.clone()),
            filename: Some("text".into()),
        })
        .await
        .expect("save");

    let listed = store
        .list(HistoryKind::Summaries, Some(&user), DEFAULT_LIST_LIMIT)
        .await
        .expect("list");
    assert!(listed.iter().any(|entry| entry.id == id), "saved record listed");

    store
        .delete(HistoryKind::Summaries, &id)
        .await
        .expect("delete");
    let listed = store
        .list(HistoryKind::Summaries, Some(&user), DEFAULT_LIST_LIMIT)
        .await
        .expect("list after delete");
    assert!(listed.iter().all(|entry| entry.id != id), "record removed");
}

#[tokio::test]
#[ignore = "Requires a live inference API"]
async fn live_stitched_summary() {
    let config = init_config_once();
    let tokenizer = tokio::task::spawn_blocking(move || get_tokenizer(config))
        .await
        .expect("tokenizer task")
        .expect("tokenizer");
    let summarizer = summarization::get_summarizer(config).expect("summarizer");
    let params = SummaryParams {
        min_final_tokens: 20,
        max_final_tokens: 60,
        ..SummaryParams::from_config(config).expect("params")
    };

    let result = summarize_stitched(JUDGMENT, tokenizer.as_ref(), summarizer.as_ref(), &params)
        .await
        .expect("summary");
    assert_eq!(result.chunk_count, 1);
    assert!(!result.summary.is_empty(), "summary should not be empty");
}

#[tokio::test]
#[ignore = "Requires a live inference API"]
async fn live_question_answering() {
    let config = init_config_once();
    let answerer = answering::get_question_answerer(config).expect("answerer");
    let answer = answerer
        .answer("Who sued for eviction?", JUDGMENT)
        .await
        .expect("answer");
    assert!(!answer.answer.is_empty());
    assert!((0.0..=1.0).contains(&answer.score));
}
