/// Decision engine: maps an infraction's ranked matches to a status and a
/// confidence band. Pure function of its inputs and the thresholds.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::extractor::Infraction;
use crate::ranker::{Match, excerpt};

/// Characters of the top match quoted as the reason for a repeal.
pub const REASON_CHARS: usize = 300;

pub const NO_MATCH_REASON: &str = "No matching specification found";
pub const WEAK_MATCH_REASON: &str = "Weak specification match";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Valid,
    PotentiallyRepealable,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::PotentiallyRepealable => "POTENTIALLY_REPEALABLE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    /// Coarse numeric proxy for the band. Deliberately independent of the raw
    /// similarity, which is reported separately.
    #[must_use]
    pub fn score(self) -> f32 {
        match self {
            Self::Low => 0.4,
            Self::Medium => 0.6,
            Self::High => 0.8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one infraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub infraction_id: String,
    pub matches: Vec<Match>,
    pub status: Status,
    pub confidence_band: ConfidenceBand,
    pub confidence_score: f32,
    pub primary_reason: String,
    /// Highest similarity among `matches`, if any.
    pub best_similarity: Option<f32>,
    /// Why the infraction could not be scored (ERROR records only).
    pub note: Option<String>,
}

impl AnalysisResult {
    /// Record for an infraction whose embedding or ranking failed.
    pub fn failed(infraction: &Infraction, note: impl Into<String>) -> Self {
        Self {
            infraction_id: infraction.id.clone(),
            matches: Vec::new(),
            status: Status::Error,
            confidence_band: ConfidenceBand::Low,
            confidence_score: 0.0,
            primary_reason: "Infraction could not be analyzed".to_string(),
            best_similarity: None,
            note: Some(note.into()),
        }
    }
}

/// Apply the decision tree to `matches` (ranked best first).
#[must_use]
pub fn decide(infraction: &Infraction, matches: Vec<Match>, thresholds: &Thresholds) -> AnalysisResult {
    let best = matches
        .iter()
        .map(|m| m.similarity)
        .max_by(f32::total_cmp);
    let top_excerpt = || {
        matches
            .iter()
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity).then(b.spec_chunk_id.cmp(&a.spec_chunk_id)))
            .map(|m| excerpt(&m.excerpt, REASON_CHARS))
            .unwrap_or_default()
    };

    let (status, band, reason) = match best {
        None => (Status::Valid, ConfidenceBand::Low, NO_MATCH_REASON.to_string()),
        Some(s) if s < thresholds.min_match => {
            (Status::Valid, ConfidenceBand::Low, NO_MATCH_REASON.to_string())
        }
        Some(s) if s >= thresholds.high_confidence => {
            (Status::PotentiallyRepealable, ConfidenceBand::High, top_excerpt())
        }
        Some(s) if s >= thresholds.medium_confidence => {
            (Status::PotentiallyRepealable, ConfidenceBand::Medium, top_excerpt())
        }
        Some(_) => (Status::Valid, ConfidenceBand::Medium, WEAK_MATCH_REASON.to_string()),
    };

    AnalysisResult {
        infraction_id: infraction.id.clone(),
        matches,
        status,
        confidence_band: band,
        confidence_score: band.score(),
        primary_reason: reason,
        best_similarity: best,
        note: None,
    }
}
