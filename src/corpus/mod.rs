//! Specification corpus: overlapping text chunks with precomputed embeddings.
//!
//! A [`store::ChunkStore`] is built once per corpus upload and never mutated
//! afterwards. The [`registry::CorpusRegistry`] holds the live store and swaps
//! it wholesale on replace, so readers see either the old corpus or the new
//! one, never a mix.

pub mod chunker;
pub mod loader;
pub mod registry;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw specification document supplied by the ingestion layer.
///
/// Form feed characters (`\x0c`) in `text` are treated as page breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDocument {
    pub id: String,
    pub text: String,
}

impl SpecDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Where a chunk starts inside its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkLocation {
    /// Character offset into a document without page breaks.
    Offset { offset: usize },
    /// 1-based page number and character offset within that page.
    Page { page: usize, offset: usize },
}

impl std::fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offset { offset } => write!(f, "@{offset}"),
            Self::Page { page, offset } => write!(f, "p.{page}@{offset}"),
        }
    }
}

/// One embedded window of specification text. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecChunk {
    /// Insertion index within the store; also the tie-breaker when ranking.
    pub id: u64,
    pub source_document: String,
    pub location: ChunkLocation,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}
