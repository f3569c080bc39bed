use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{ChunkingConfig, Config, IndexConfig};
use crate::embedder::{Embedder, EmbedderError, l2_norm};
use crate::error::{EngineError, Result};
use crate::pool::parallel_map;
use crate::ranker::ivf::IvfIndex;

use super::chunker::{TextWindow, split_document};
use super::{SpecChunk, SpecDocument};

/// Tolerance on `||embedding|| == 1` for stored chunks.
const NORM_TOLERANCE: f32 = 1e-3;

/// Settings used when building a store.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub workers: usize,
}

impl BuildOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking,
            index: config.index,
            workers: config.worker_count(),
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            index: IndexConfig::default(),
            workers: 1,
        }
    }
}

/// Immutable snapshot of an embedded specification corpus.
///
/// The chunk vector is the arena; the optional IVF index refers to chunks by
/// position in it.
#[derive(Debug)]
pub struct ChunkStore {
    chunks: Vec<SpecChunk>,
    dimensions: usize,
    model_id: String,
    built_at: DateTime<Utc>,
    index: Option<IvfIndex>,
}

impl ChunkStore {
    /// A valid store with no chunks. Every query against it returns nothing.
    pub fn empty(dimensions: usize, model_id: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            dimensions,
            model_id: model_id.into(),
            built_at: Utc::now(),
            index: None,
        }
    }

    /// Chunk and embed `documents`.
    ///
    /// Windows without embeddable text (separator lines and the like) are
    /// skipped. Any other embedding failure aborts the build, so a half
    /// embedded corpus never becomes visible.
    pub fn build(
        documents: &[SpecDocument],
        embedder: &dyn Embedder,
        options: &BuildOptions,
    ) -> Result<Self> {
        let windows: Vec<(&str, TextWindow)> = documents
            .iter()
            .flat_map(|doc| {
                split_document(&doc.text, &options.chunking)
                    .into_iter()
                    .map(move |w| (doc.id.as_str(), w))
            })
            .collect();

        info!(
            "Embedding {} chunk(s) from {} document(s)",
            windows.len(),
            documents.len()
        );

        let embedded = parallel_map(&windows, options.workers, |(_, w)| {
            embedder.embed_passage(&w.text)
        });

        let created_at = Utc::now();
        let mut chunks = Vec::with_capacity(windows.len());
        for ((doc_id, window), result) in windows.into_iter().zip(embedded) {
            let embedding = match result {
                Ok(v) => v,
                Err(EmbedderError::EmptyInput) => {
                    warn!("Skipping chunk without text in {doc_id} at {}", window.location);
                    continue;
                }
                Err(e) if e.is_fatal() => return Err(EngineError::EmbedderUnavailable(e)),
                Err(e) => {
                    return Err(EngineError::CorpusBuild(format!(
                        "{doc_id} at {}: {e}",
                        window.location
                    )));
                }
            };
            chunks.push(SpecChunk {
                id: chunks.len() as u64,
                source_document: doc_id.to_string(),
                location: window.location,
                text: window.text,
                embedding,
                created_at,
            });
        }

        Self::from_chunks(
            chunks,
            embedder.dimensions(),
            embedder.model_id(),
            created_at,
            &options.index,
            options.workers,
        )
    }

    /// Assemble a store from already embedded chunks (e.g. loaded from disk).
    ///
    /// Checks that ids are insertion positions and that every embedding has
    /// the corpus dimension and unit length.
    pub fn from_chunks(
        chunks: Vec<SpecChunk>,
        dimensions: usize,
        model_id: impl Into<String>,
        built_at: DateTime<Utc>,
        index_config: &IndexConfig,
        workers: usize,
    ) -> Result<Self> {
        for (pos, chunk) in chunks.iter().enumerate() {
            if chunk.id != pos as u64 {
                return Err(EngineError::CorpusBuild(format!(
                    "chunk at position {pos} has id {}",
                    chunk.id
                )));
            }
            if chunk.embedding.len() != dimensions {
                return Err(EngineError::CorpusBuild(format!(
                    "chunk {} has dimension {}, corpus dimension is {dimensions}",
                    chunk.id,
                    chunk.embedding.len()
                )));
            }
            let norm = l2_norm(&chunk.embedding);
            if (norm - 1.0).abs() > NORM_TOLERANCE {
                return Err(EngineError::CorpusBuild(format!(
                    "chunk {} embedding is not normalized (norm {norm})",
                    chunk.id
                )));
            }
        }

        let index = if !chunks.is_empty() && chunks.len() >= index_config.ivf_min_chunks {
            let vectors: Vec<&[f32]> = chunks.iter().map(|c| c.embedding.as_slice()).collect();
            Some(IvfIndex::build(&vectors, dimensions, index_config, workers))
        } else {
            None
        };

        Ok(Self {
            chunks,
            dimensions,
            model_id: model_id.into(),
            built_at,
            index,
        })
    }

    #[must_use]
    pub fn chunks(&self) -> &[SpecChunk] {
        &self.chunks
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&SpecChunk> {
        self.chunks.get(usize::try_from(id).ok()?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[must_use]
    pub fn index(&self) -> Option<&IvfIndex> {
        self.index.as_ref()
    }

    /// Distinct source documents, in order of first appearance.
    #[must_use]
    pub fn document_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for c in &self.chunks {
            if !ids.contains(&c.source_document.as_str()) {
                ids.push(&c.source_document);
            }
        }
        ids
    }
}
