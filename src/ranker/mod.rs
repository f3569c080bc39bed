//! Similarity ranking of specification chunks against a query vector.
//!
//! All vectors are unit length, so cosine similarity is a plain dot product.
//! Small corpora are scanned exhaustively; stores that carry an
//! [`ivf::IvfIndex`] are probed first and the candidates rescored exactly.
//! Either way results are sorted by descending similarity with ties broken
//! by chunk insertion order.

pub mod ivf;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::corpus::ChunkLocation;
use crate::corpus::store::ChunkStore;

/// Maximum characters of chunk text carried in a [`Match`].
pub const EXCERPT_CHARS: usize = 500;

/// One ranked specification chunk for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub spec_chunk_id: u64,
    pub source_document: String,
    pub location: ChunkLocation,
    pub excerpt: String,
    pub similarity: f32,
}

#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// anything was cut.
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", text[..byte_idx].trim_end()),
        None => text.to_string(),
    }
}

fn by_score_then_position(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

/// Keep the `top_k` best `(score, position)` pairs, best first.
fn top_k_sorted(mut scored: Vec<(f32, usize)>, top_k: usize) -> Vec<(f32, usize)> {
    if top_k == 0 {
        return Vec::new();
    }
    if scored.len() > top_k {
        scored.select_nth_unstable_by(top_k - 1, by_score_then_position);
        scored.truncate(top_k);
    }
    scored.sort_by(by_score_then_position);
    scored
}

/// Return the `top_k` chunks most similar to `query`.
///
/// `query` must be a unit vector of the store's dimension. Returns at most
/// `min(top_k, store.len())` matches; an empty store yields no matches.
#[must_use]
pub fn rank(store: &ChunkStore, query: &[f32], top_k: usize) -> Vec<Match> {
    let chunks = store.chunks();
    let score = |pos: usize| (dot(&chunks[pos].embedding, query), pos);

    let exhaustive = || (0..chunks.len()).map(score).collect::<Vec<_>>();
    let scored = match store.index() {
        Some(index) => {
            let candidates = index.probe(query);
            if candidates.len() >= top_k {
                candidates.into_iter().map(score).collect()
            } else {
                exhaustive()
            }
        }
        None => exhaustive(),
    };

    top_k_sorted(scored, top_k)
        .into_iter()
        .map(|(similarity, pos)| {
            let chunk = &chunks[pos];
            Match {
                spec_chunk_id: chunk.id,
                source_document: chunk.source_document.clone(),
                location: chunk.location,
                excerpt: excerpt(&chunk.text, EXCERPT_CHARS),
                similarity: similarity.clamp(-1.0, 1.0),
            }
        })
        .collect()
}
