/// Audit analysis engine.
///
/// Owns the embedder and the corpus registry. `analyze` runs extract, embed,
/// rank and decide for every infraction on a worker pool, reading a single
/// corpus snapshot for the whole run.
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, Thresholds};
use crate::corpus::SpecDocument;
use crate::corpus::registry::{CorpusHandle, CorpusRegistry};
use crate::corpus::store::{BuildOptions, ChunkStore};
use crate::decision::{AnalysisResult, decide};
use crate::embedder::{self, Embedder, EmbedderError};
use crate::error::{EngineError, Result};
use crate::extractor::{Infraction, extract_infractions};
use crate::pool::parallel_map;
use crate::ranker::rank;
use crate::report::{AnalysisReport, assemble};

/// Per-call overrides for `analyze`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Replaces the engine's default thresholds for this call only.
    pub thresholds: Option<Thresholds>,
}

impl AnalysisOptions {
    #[must_use]
    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            thresholds: Some(thresholds),
        }
    }
}

pub struct Engine {
    embedder: Arc<dyn Embedder>,
    registry: CorpusRegistry,
    build: BuildOptions,
    thresholds: Thresholds,
}

impl Engine {
    pub fn new(embedder: Arc<dyn Embedder>, build: BuildOptions, thresholds: Thresholds) -> Self {
        Self {
            embedder,
            registry: CorpusRegistry::new(),
            build,
            thresholds,
        }
    }

    /// Engine with the configured embedder, chunking, index and thresholds.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let embedder = embedder::from_config(&config.model)?;
        info!(
            "Embedder {} ({} dimensions), {} worker(s)",
            embedder.model_id(),
            embedder.dimensions(),
            config.worker_count()
        );
        Ok(Self::new(
            embedder,
            BuildOptions::from_config(config),
            config.thresholds,
        ))
    }

    #[must_use]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Build the corpus from `documents` and make it live.
    ///
    /// If a corpus is already live this is a replace.
    pub fn build_corpus(&self, documents: &[SpecDocument]) -> Result<CorpusHandle> {
        if self.registry.is_built() {
            warn!("A corpus is already installed; build_corpus replaces it");
        }
        self.replace_corpus(documents)
    }

    /// Build a new corpus off to the side, then swap it in atomically.
    /// Runs in flight keep the snapshot they started with.
    pub fn replace_corpus(&self, documents: &[SpecDocument]) -> Result<CorpusHandle> {
        let store = ChunkStore::build(documents, self.embedder.as_ref(), &self.build)?;
        self.install_store(store)
    }

    /// Make an already built store (e.g. loaded from disk) the live corpus.
    pub fn install_store(&self, store: ChunkStore) -> Result<CorpusHandle> {
        if store.dimensions() != self.embedder.dimensions() {
            return Err(EngineError::CorpusDimensionMismatch {
                corpus: store.dimensions(),
                embedder: self.embedder.dimensions(),
            });
        }
        if store.model_id() != self.embedder.model_id() {
            return Err(EngineError::CorpusBuild(format!(
                "corpus was embedded with {}, engine uses {}",
                store.model_id(),
                self.embedder.model_id()
            )));
        }
        let (handle, previous) = self.registry.install(store);
        if let Some(previous) = previous {
            info!(
                "Corpus generation {} superseded by {}",
                previous.generation(),
                handle.generation()
            );
        }
        Ok(handle)
    }

    /// Handle of the live corpus.
    pub fn current_corpus(&self) -> Result<CorpusHandle> {
        self.registry.current()
    }

    /// Analyze one audit document against `corpus`.
    ///
    /// Input problems (empty or binary text, stale or foreign handle, bad
    /// thresholds) fail before any work is done. A failure embedding a single
    /// infraction becomes an `ERROR` entry; an unusable embedder aborts the
    /// whole run.
    pub fn analyze(
        &self,
        text: &str,
        corpus: &CorpusHandle,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport> {
        if text.trim().is_empty() {
            return Err(EngineError::InvalidInput("audit text is empty".to_string()));
        }
        if text.contains('\0') {
            return Err(EngineError::InvalidInput(
                "audit text contains binary data".to_string(),
            ));
        }
        self.registry.validate(corpus)?;
        let store = corpus.store();
        if store.dimensions() != self.embedder.dimensions() {
            return Err(EngineError::CorpusDimensionMismatch {
                corpus: store.dimensions(),
                embedder: self.embedder.dimensions(),
            });
        }
        let thresholds = options.thresholds.unwrap_or(self.thresholds);
        thresholds.validate()?;

        let extraction = extract_infractions(text);
        info!(
            "Extracted {} infraction(s); analyzing against corpus generation {} ({} chunks)",
            extraction.infractions.len(),
            corpus.generation(),
            store.len()
        );

        let outcomes = parallel_map(&extraction.infractions, self.build.workers, |infraction| {
            self.analyze_one(infraction, store, &thresholds)
        });
        let results = outcomes
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(EngineError::EmbedderUnavailable)?;

        let report = assemble(extraction, results);
        info!("Analysis complete: {}", report.summary);
        Ok(report)
    }

    /// `analyze` against whatever corpus is live right now.
    pub fn analyze_current(&self, text: &str, options: &AnalysisOptions) -> Result<AnalysisReport> {
        let corpus = self.current_corpus()?;
        self.analyze(text, &corpus, options)
    }

    /// Only fatal embedder errors escape; everything else is an ERROR record.
    fn analyze_one(
        &self,
        infraction: &Infraction,
        store: &ChunkStore,
        thresholds: &Thresholds,
    ) -> std::result::Result<AnalysisResult, EmbedderError> {
        let query = match self.embedder.embed_query(&infraction.raw_text) {
            Ok(v) => v,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not embed {}: {e}", infraction.id);
                return Ok(AnalysisResult::failed(infraction, e.to_string()));
            }
        };
        if query.len() != store.dimensions() {
            return Err(EmbedderError::DimensionMismatch {
                expected: store.dimensions(),
                actual: query.len(),
            });
        }
        let matches = rank(store, &query, thresholds.top_k);
        Ok(decide(infraction, matches, thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{ConfidenceBand, Status};
    use crate::embedder::hashing::HashingEmbedder;

    fn engine(embedder: impl Embedder + 'static) -> Engine {
        let build = BuildOptions {
            workers: 2,
            ..BuildOptions::default()
        };
        Engine::new(Arc::new(embedder), build, Thresholds::default())
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedderError> {
            Err(EmbedderError::ModelLoadFailed("session gone".into()))
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn model_id(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_analyze_rejects_empty_and_binary_text() {
        let e = engine(HashingEmbedder::new(32));
        let handle = e.build_corpus(&[]).unwrap();
        let opts = AnalysisOptions::default();
        assert!(matches!(e.analyze("", &handle, &opts), Err(EngineError::InvalidInput(_))));
        assert!(matches!(e.analyze(" \n ", &handle, &opts), Err(EngineError::InvalidInput(_))));
        assert!(matches!(
            e.analyze("missing\0guard", &handle, &opts),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_analyze_without_corpus() {
        let e = engine(HashingEmbedder::new(32));
        assert!(matches!(
            e.analyze_current("Pole tag missing", &AnalysisOptions::default()),
            Err(EngineError::CorpusUnavailable)
        ));
    }

    #[test]
    fn test_invalid_threshold_override() {
        let e = engine(HashingEmbedder::new(32));
        let handle = e.build_corpus(&[]).unwrap();
        let bad = Thresholds {
            min_match: 0.9,
            ..Thresholds::default()
        };
        assert!(matches!(
            e.analyze("Pole tag missing", &handle, &AnalysisOptions::with_thresholds(bad)),
            Err(EngineError::InvalidThresholds(_))
        ));
    }

    #[test]
    fn test_install_rejects_other_dimension() {
        let e = engine(HashingEmbedder::new(32));
        let err = e.install_store(ChunkStore::empty(16, "hashing-v2/16")).unwrap_err();
        assert!(matches!(err, EngineError::CorpusDimensionMismatch { corpus: 16, embedder: 32 }));
    }

    #[test]
    fn test_install_rejects_other_model() {
        let e = engine(HashingEmbedder::new(32));
        assert!(e.install_store(ChunkStore::empty(32, "onnx/other/32")).is_err());
    }

    #[test]
    fn test_fatal_embedder_error_aborts_run() {
        let e = engine(BrokenEmbedder);
        let handle = e.install_store(ChunkStore::empty(8, "broken")).unwrap();
        let err = e
            .analyze("INFRACTION #1: Pole tag missing", &handle, &AnalysisOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::EmbedderUnavailable(_)));
    }

    #[test]
    fn test_empty_marker_body_is_error_record() {
        let e = engine(HashingEmbedder::new(32));
        let handle = e.build_corpus(&[]).unwrap();
        let report = e
            .analyze(
                "INFRACTION #1:\nINFRACTION #2: Ground rod too short",
                &handle,
                &AnalysisOptions::default(),
            )
            .unwrap();
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.infractions[0].status, Status::Error);
        assert!(report.infractions[0].note.is_some());
        assert_eq!(report.infractions[1].status, Status::Valid);
        assert_eq!(report.infractions[1].confidence_band, ConfidenceBand::Low);
    }

    #[test]
    fn test_build_twice_replaces() {
        let e = engine(HashingEmbedder::new(32));
        let first = e.build_corpus(&[]).unwrap();
        let second = e
            .build_corpus(&[SpecDocument::new("d", "Guy guards are optional on private land.")])
            .unwrap();
        assert!(second.generation() > first.generation());
        assert!(matches!(
            e.analyze("Guy guard missing", &first, &AnalysisOptions::default()),
            Err(EngineError::StaleCorpus { .. })
        ));
        assert_eq!(e.current_corpus().unwrap().store().len(), 1);
    }
}
