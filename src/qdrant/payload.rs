//! Helpers for constructing, filtering, and hashing Qdrant payloads.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Compute a deterministic SHA-256 hash of a text field.
pub fn compute_text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct a point identifier Qdrant accepts.
pub fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}

/// Exact-match filter on a keyword payload field; `None` when the value is blank.
pub fn keyword_filter(field: &str, value: Option<&str>) -> Option<Value> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    Some(json!({
        "must": [
            {
                "key": field,
                "match": { "value": value }
            }
        ]
    }))
}
