use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;

use super::SpecDocument;

/// Stable document id for a path: forward slashes on every platform.
#[must_use]
pub fn document_id(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Read specification documents from disk. Files that are not valid UTF-8
/// text are skipped with a warning.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<SpecDocument>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        match String::from_utf8(bytes) {
            Ok(text) => documents.push(SpecDocument::new(document_id(path), text)),
            Err(_) => warn!("Skipping non-text specification file {}", path.display()),
        }
    }
    Ok(documents)
}

/// Load every document matched by the configured corpus patterns.
pub fn load_from_config(config: &Config) -> Result<Vec<SpecDocument>> {
    let files = config.get_corpus_files()?;
    info!("Found {} specification file(s)", files.len());
    load_documents(&files)
}
