use chrono::{DateTime, Utc};
use serde::Serialize;

/// Description of the persisted corpus, as shown by `specaudit status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusMeta {
    pub model_id: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub built_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}
