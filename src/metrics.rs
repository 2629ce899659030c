use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_summarized: AtomicU64,
    chunks_summarized: AtomicU64,
    questions_answered: AtomicU64,
    retrievals_performed: AtomicU64,
    records_saved: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summarized document and the number of windows it was split into.
    pub fn record_summary(&self, chunk_count: u64) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record an answered question, noting whether retrieval reduced its context.
    pub fn record_answer(&self, retrieved: bool) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if retrieved {
            self.retrievals_performed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a saved history record.
    pub fn record_save(&self) {
        self.records_saved.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            retrievals_performed: self.retrievals_performed.load(Ordering::Relaxed),
            records_saved: self.records_saved.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents summarized since startup.
    pub documents_summarized: u64,
    /// Token windows summarized across all documents.
    pub chunks_summarized: u64,
    /// Questions answered since startup.
    pub questions_answered: u64,
    /// Answers whose context was reduced by sentence retrieval.
    pub retrievals_performed: u64,
    /// Summaries and answers saved to history.
    pub records_saved: u64,
}
