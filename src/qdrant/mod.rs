//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use payload::compute_text_hash;
pub use types::{QdrantError, StoredPoint};
