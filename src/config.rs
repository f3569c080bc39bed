/// Configuration module for specaudit.
///
/// Handles loading, validating, and providing default configuration values.
/// The decision thresholds live here as an immutable [`Thresholds`] value that
/// is passed down the call chain, so several deployments can run side by side
/// with different tuning.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineError;

/// File extensions accepted as specification documents.
const CORPUS_EXTENSIONS: &[&str] = &["txt", "md"];

// ── Default value functions ──────────────────────────────────────────

fn default_corpus_patterns() -> Vec<String> {
    vec!["./specs".to_string()]
}

fn default_db_path() -> String {
    "./corpus.db".to_string()
}

fn default_target_chars() -> usize {
    800
}

fn default_min_chars() -> usize {
    500
}

fn default_max_chars() -> usize {
    1000
}

fn default_overlap_ratio() -> f32 {
    0.10
}

fn default_min_match() -> f32 {
    0.40
}

fn default_medium_confidence() -> f32 {
    0.55
}

fn default_high_confidence() -> f32 {
    0.70
}

fn default_top_k() -> usize {
    5
}

fn default_ivf_min_chunks() -> usize {
    20_000
}

fn default_nprobe() -> usize {
    8
}

fn default_iterations() -> usize {
    10
}

fn default_backend() -> EmbedderBackend {
    EmbedderBackend::Hashing
}

fn default_model_name() -> String {
    "multilingual-e5-small".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_model_dir() -> String {
    "models/multilingual-e5-small".to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_corpus_patterns")]
    pub corpus_patterns: Vec<String>,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Worker threads per audit run; 0 means one per available core.
    #[serde(default)]
    pub workers: usize,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,

    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f32,
}

/// The four tunable decision parameters.
///
/// Raising `high_confidence` can only demote HIGH results, raising
/// `min_match` can only turn repealable results into VALID ones.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Thresholds {
    #[serde(default = "default_min_match")]
    pub min_match: f32,

    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f32,

    #[serde(default = "default_high_confidence")]
    pub high_confidence: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    /// Corpus size at which the IVF index replaces the exhaustive scan.
    #[serde(default = "default_ivf_min_chunks")]
    pub ivf_min_chunks: usize,

    /// Number of inverted lists; 0 picks `sqrt(chunks)`.
    #[serde(default)]
    pub nlist: usize,

    #[serde(default = "default_nprobe")]
    pub nprobe: usize,

    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    Hashing,
    Onnx,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_backend")]
    pub backend: EmbedderBackend,

    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_model_dir")]
    pub dir: String,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_patterns: default_corpus_patterns(),
            db_path: default_db_path(),
            workers: 0,
            chunking: ChunkingConfig::default(),
            thresholds: Thresholds::default(),
            index: IndexConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            overlap_ratio: default_overlap_ratio(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_match: default_min_match(),
            medium_confidence: default_medium_confidence(),
            high_confidence: default_high_confidence(),
            top_k: default_top_k(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ivf_min_chunks: default_ivf_min_chunks(),
            nlist: 0,
            nprobe: default_nprobe(),
            iterations: default_iterations(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: default_model_name(),
            dimensions: default_dimensions(),
            dir: default_model_dir(),
        }
    }
}

// ── Thresholds ───────────────────────────────────────────────────────

impl Thresholds {
    /// Check ordering and ranges. Cosine similarity lives in `[-1, 1]`.
    pub fn validate(&self) -> Result<(), EngineError> {
        let in_range = |v: f32| v.is_finite() && (-1.0..=1.0).contains(&v);
        if !in_range(self.min_match)
            || !in_range(self.medium_confidence)
            || !in_range(self.high_confidence)
        {
            return Err(EngineError::InvalidThresholds(
                "similarity thresholds must lie in [-1, 1]".to_string(),
            ));
        }
        if self.min_match > self.medium_confidence || self.medium_confidence > self.high_confidence
        {
            return Err(EngineError::InvalidThresholds(format!(
                "expected min_match <= medium_confidence <= high_confidence, got {} / {} / {}",
                self.min_match, self.medium_confidence, self.high_confidence
            )));
        }
        if self.top_k == 0 {
            return Err(EngineError::InvalidThresholds(
                "top_k must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");

        if cfg.corpus_patterns.is_empty() {
            cfg.corpus_patterns = default_corpus_patterns();
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        let c = &self.chunking;
        anyhow::ensure!(c.min_chars > 0, "chunking.min_chars must be positive");
        anyhow::ensure!(
            c.min_chars <= c.target_chars && c.target_chars <= c.max_chars,
            "expected chunking.min_chars <= target_chars <= max_chars"
        );
        anyhow::ensure!(
            (0.0..0.5).contains(&c.overlap_ratio),
            "chunking.overlap_ratio must be in [0, 0.5)"
        );
        anyhow::ensure!(self.index.nprobe > 0, "index.nprobe must be positive");
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(
            !self.corpus_patterns.is_empty(),
            "at least one corpus pattern must be specified"
        );
        Ok(())
    }

    /// Number of worker threads for one audit run.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Expand all corpus patterns and return matching specification files,
    /// sorted so corpus builds are reproducible.
    pub fn get_corpus_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for pattern in &self.corpus_patterns {
            match expand_pattern(pattern) {
                Ok(matches) => files.extend(matches),
                Err(e) => warn!("Failed to expand pattern {pattern}: {e}"),
            }
        }

        Ok(files.into_iter().collect())
    }
}

// ── Pattern helpers ──────────────────────────────────────────────────

fn is_corpus_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CORPUS_EXTENSIONS.contains(&e))
}

/// Expand a single pattern to matching specification files.
fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    // No wildcards: a directory to walk, or a single file
    if !pattern.contains('*') && !pattern.contains('?') {
        let path = Path::new(pattern);
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        return Ok(walk_dir(path));
    }

    let matches = glob::glob(pattern).context("invalid glob pattern")?;
    Ok(matches.flatten().filter(|p| is_corpus_file(p)).collect())
}

/// Walk a directory recursively (respecting .gitignore), collecting corpus files.
fn walk_dir(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    WalkBuilder::new(dir)
        .hidden(false)
        .build()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| is_corpus_file(p))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.thresholds.top_k, 5);
        assert!((config.thresholds.min_match - 0.40).abs() < f32::EPSILON);
        assert!((config.thresholds.medium_confidence - 0.55).abs() < f32::EPSILON);
        assert!((config.thresholds.high_confidence - 0.70).abs() < f32::EPSILON);
        assert_eq!(config.chunking.target_chars, 800);
        assert_eq!(config.model.dimensions, 384);
        assert_eq!(config.model.backend, EmbedderBackend::Hashing);
        assert_eq!(config.index.ivf_min_chunks, 20_000);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"thresholds": {"high_confidence": 0.8}, "db_path": "./test.db"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!((config.thresholds.high_confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.db_path, "./test.db");
        // Other fields should have defaults
        assert_eq!(config.thresholds.top_k, 5);
        assert!((config.thresholds.min_match - 0.40).abs() < f32::EPSILON);
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let json = r#"{"model": {"backend": "onnx"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.model.backend, EmbedderBackend::Onnx);
        assert_eq!(config.model.name, "multilingual-e5-small");
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_threshold_order() {
        let mut config = Config::default();
        config.thresholds.medium_confidence = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_top_k() {
        let t = Thresholds {
            top_k: 0,
            ..Thresholds::default()
        };
        assert!(matches!(t.validate(), Err(EngineError::InvalidThresholds(_))));
    }

    #[test]
    fn test_validate_out_of_range() {
        let t = Thresholds {
            high_confidence: 1.5,
            ..Thresholds::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_validate_bad_chunking() {
        let mut config = Config::default();
        config.chunking.min_chars = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
        // Templates are only written for the default path
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.db_path, "./corpus.db");
    }

    #[test]
    fn test_corpus_files_from_directory_and_glob() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "spec a").unwrap();
        fs::write(dir.path().join("b.md"), "spec b").unwrap();
        fs::write(dir.path().join("c.pdf"), "binary").unwrap();

        let mut config = Config::default();
        config.corpus_patterns = vec![dir.path().to_string_lossy().to_string()];
        let files = config.get_corpus_files().unwrap();
        assert_eq!(files.len(), 2);

        config.corpus_patterns = vec![format!("{}/*.md", dir.path().display())];
        let files = config.get_corpus_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("b.md"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.thresholds, config.thresholds);
        assert_eq!(parsed.chunking, config.chunking);
        assert_eq!(parsed.model.name, config.model.name);
    }
}
