/// Embedder trait and shared types for text embedding.
///
/// Every implementation returns L2-normalized vectors so that cosine
/// similarity against the chunk store reduces to a dot product.
pub mod download;
pub mod hashing;
pub mod onnx;
pub mod tokenizer;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{EmbedderBackend, ModelConfig};

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("input too long: {tokens} tokens exceeds the model limit of {max}")]
    InputTooLong { tokens: usize, max: usize },

    #[error("input contains no embeddable text")]
    EmptyInput,

    #[error("embedder returned {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbedderError {
    /// Fatal errors mean the embedder itself is unusable; every other error
    /// concerns only the text that was being embedded.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ModelLoadFailed(_) | Self::DimensionMismatch { .. }
        )
    }
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a unit vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embed text used as a search query (an infraction).
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embed(text)
    }

    /// Embed text stored in the corpus (a specification chunk).
    fn embed_passage(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embed(text)
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Identifier of the model version; corpora built with another model
    /// must be rebuilt.
    fn model_id(&self) -> &str;
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return;
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    for v in vec.iter_mut() {
        *v *= inv_norm;
    }
}

/// Euclidean norm of a vector.
#[must_use]
pub fn l2_norm(vec: &[f32]) -> f32 {
    vec.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Build the embedder selected by the model configuration.
///
/// The ONNX backend downloads missing model files first.
pub fn from_config(model: &ModelConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    anyhow::ensure!(model.dimensions > 0, "model.dimensions must be > 0");
    match model.backend {
        EmbedderBackend::Hashing => Ok(Arc::new(hashing::HashingEmbedder::new(model.dimensions))),
        EmbedderBackend::Onnx => {
            let dir = Path::new(&model.dir);
            download::download_model_files(dir, &model.name)?;
            let embedder = onnx::OnnxEmbedder::new(dir, &model.name, model.dimensions)?;
            Ok(Arc::new(embedder))
        }
    }
}
