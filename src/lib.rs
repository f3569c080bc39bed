//! # specaudit: go-back repeal analysis
//!
//! Turns quality-assurance audit text into discrete infraction records and
//! scores each one against an embedded specification corpus to decide
//! whether it is a true violation or potentially repealable.
//!
//! ## Architecture
//!
//! - **[`extractor`]**: Infraction extraction (structured markers, checklist rows, keywords)
//! - **[`embedder`]**: Text embedding: deterministic hashing, or ONNX Runtime (multilingual-e5-small)
//! - **[`corpus`]**: Specification chunking, immutable chunk stores, atomic corpus swaps
//! - **[`ranker`]**: Top-K cosine similarity, exhaustive or IVF-indexed
//! - **[`decision`]**: Threshold decision tree and confidence bands
//! - **[`report`]**: Per-infraction results and run summary (JSON)
//! - **[`engine`]**: `build_corpus` / `replace_corpus` / `analyze` orchestration
//! - **[`db`]**: SQLite corpus snapshots
//! - **[`config`]**: Configuration loading, validation, and pattern expansion
//! - **[`pool`]**: Scoped worker pool for per-item parallelism
//! - **[`error`]**: Engine error taxonomy

pub mod config;
pub mod corpus;
pub mod db;
pub mod decision;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod pool;
pub mod ranker;
pub mod report;

pub use config::{Config, Thresholds};
pub use corpus::SpecDocument;
pub use corpus::registry::CorpusHandle;
pub use decision::{AnalysisResult, ConfidenceBand, Status};
pub use engine::{AnalysisOptions, Engine};
pub use error::EngineError;
pub use extractor::{DetectionMethod, Infraction, extract_infractions};
pub use report::{AnalysisReport, Summary};
