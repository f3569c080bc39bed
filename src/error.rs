/// Engine-level error taxonomy.
///
/// Failures that concern shared state (corpus, embedder) abort a run and are
/// surfaced as [`EngineError`]. Failures local to a single infraction never
/// reach this type: they become `ERROR` records in the report.
use thiserror::Error;

use crate::embedder::EmbedderError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("corpus handle is stale: generation {handle} was superseded by {current}")]
    StaleCorpus { handle: u64, current: u64 },

    #[error("corpus handle was issued by a different engine")]
    ForeignCorpus,

    #[error("corpus dimension {corpus} does not match embedder dimension {embedder}")]
    CorpusDimensionMismatch { corpus: usize, embedder: usize },

    #[error("no specification corpus has been built; build or load one before analyzing")]
    CorpusUnavailable,

    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(#[source] EmbedderError),

    #[error("corpus build failed: {0}")]
    CorpusBuild(String),

    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),
}

impl EngineError {
    /// Whether the caller supplied something unusable (bad text, bad handle,
    /// bad thresholds) as opposed to the engine lacking shared state.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::StaleCorpus { .. }
                | Self::ForeignCorpus
                | Self::CorpusDimensionMismatch { .. }
                | Self::InvalidThresholds(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_classification() {
        assert!(EngineError::InvalidInput("empty".into()).is_input_error());
        assert!(EngineError::StaleCorpus { handle: 1, current: 2 }.is_input_error());
        assert!(EngineError::ForeignCorpus.is_input_error());
        assert!(!EngineError::CorpusUnavailable.is_input_error());
        assert!(
            !EngineError::EmbedderUnavailable(EmbedderError::ModelLoadFailed("x".into()))
                .is_input_error()
        );
    }

    #[test]
    fn test_corpus_unavailable_message() {
        let msg = EngineError::CorpusUnavailable.to_string();
        assert!(msg.contains("no specification corpus"));
    }
}
