/// Deterministic feature-hashing embedder.
///
/// Projects the normalized terms of a text into a fixed number of signed
/// buckets. Texts sharing vocabulary get a high cosine similarity, which is
/// enough for keyword-heavy specification language and needs no model files.
/// FNV-1a keeps bucket assignment stable across processes and toolchains, so
/// persisted corpora stay comparable with fresh queries. Bucket signs come
/// from a remix of the term hash, independent of the bucket index.
use std::collections::BTreeMap;

use super::{Embedder, EmbedderError, l2_normalize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "as", "at", "be", "been", "being", "but", "by", "for",
    "from", "has", "have", "if", "in", "into", "is", "it", "its", "no", "not", "of", "on",
    "or", "per", "shall", "should", "than", "that", "the", "then", "these", "this", "those",
    "to", "under", "was", "were", "will", "with",
];

/// Embedder producing unit vectors from hashed term frequencies.
pub struct HashingEmbedder {
    dimensions: usize,
    max_terms: Option<usize>,
    model_id: String,
}

impl HashingEmbedder {
    /// Create a new `HashingEmbedder` with the given dimensionality.
    ///
    /// # Panics
    ///
    /// Panics if `dimensions` is zero.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        assert!(dimensions > 0, "embedding dimensions must be non-zero");
        Self {
            dimensions,
            max_terms: None,
            model_id: format!("hashing-v2/{dimensions}"),
        }
    }

    /// Reject inputs with more than `max_terms` terms, the way a
    /// transformer rejects inputs longer than its context.
    #[must_use]
    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = Some(max_terms);
        self
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// SplitMix64 finalizer.
fn remix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Plural folding: "crossarms" and "crossarm" share a bucket.
fn stem(term: &str) -> &str {
    if term.len() > 3 && term.ends_with('s') && !term.ends_with("ss") {
        &term[..term.len() - 1]
    } else {
        term
    }
}

/// Lowercased alphanumeric terms with stop words removed. Falls back to the
/// unfiltered terms when the text consists solely of stop words.
pub fn terms(text: &str) -> Vec<String> {
    let raw: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    let filtered: Vec<String> = raw
        .iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .map(|t| stem(t).to_string())
        .collect();

    if filtered.is_empty() { raw } else { filtered }
}

impl HashingEmbedder {
    fn project(&self, counts: &BTreeMap<&str, u32>, signed: bool) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for (term, &count) in counts {
            let hash = fnv1a(term.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if signed && remix(hash) >> 63 == 1 { -1.0 } else { 1.0 };
            // Sublinear term frequency
            embedding[bucket] += sign * (1.0 + (count as f32).ln());
        }
        embedding
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let terms = terms(text);
        if terms.is_empty() {
            return Err(EmbedderError::EmptyInput);
        }
        if let Some(max) = self.max_terms {
            if terms.len() > max {
                return Err(EmbedderError::InputTooLong {
                    tokens: terms.len(),
                    max,
                });
            }
        }

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for term in &terms {
            *counts.entry(term.as_str()).or_default() += 1;
        }

        let mut embedding = self.project(&counts, true);
        // Colliding terms of opposite sign can cancel out completely
        if embedding.iter().all(|&x| x == 0.0) {
            embedding = self.project(&counts, false);
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
