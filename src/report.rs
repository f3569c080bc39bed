/// Result assembly: one entry per detected infraction plus run totals, in the
/// JSON shape consumed by reporting layers.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::corpus::ChunkLocation;
use crate::decision::{AnalysisResult, ConfidenceBand, Status};
use crate::extractor::{DetectionMethod, Extraction, ExtractionWarning, Infraction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Source document id.
    pub source: String,
    pub location: ChunkLocation,
    pub excerpt: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfractionReport {
    pub id: String,
    /// Order of appearance in the audit document, starting at 0. Stable sort key.
    pub position: usize,
    pub text: String,
    pub detection_method: DetectionMethod,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_before: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_after: String,
    pub status: Status,
    pub confidence_band: ConfidenceBand,
    pub confidence_score: f32,
    pub primary_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_similarity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub match_count: usize,
    pub matches: Vec<MatchReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub repealable: usize,
    pub valid: usize,
    pub high_confidence: usize,
    pub errors: usize,
}

impl Summary {
    fn tally(entries: &[InfractionReport]) -> Self {
        let with_status = |s: Status| entries.iter().filter(|e| e.status == s).count();
        Self {
            total: entries.len(),
            repealable: with_status(Status::PotentiallyRepealable),
            valid: with_status(Status::Valid),
            high_confidence: entries
                .iter()
                .filter(|e| e.status != Status::Error && e.confidence_band == ConfidenceBand::High)
                .count(),
            errors: with_status(Status::Error),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return f.write_str("no go-backs detected");
        }
        write!(
            f,
            "{} infraction(s): {} potentially repealable ({} high confidence), {} valid",
            self.total, self.repealable, self.high_confidence, self.valid
        )?;
        if self.errors > 0 {
            write!(f, ", {} failed", self.errors)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub infractions: Vec<InfractionReport>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
}

fn entry(position: usize, infraction: Infraction, result: AnalysisResult) -> InfractionReport {
    let matches: Vec<MatchReport> = result
        .matches
        .into_iter()
        .map(|m| MatchReport {
            source: m.source_document,
            location: m.location,
            excerpt: m.excerpt,
            similarity: m.similarity,
        })
        .collect();
    InfractionReport {
        id: infraction.id,
        position,
        text: infraction.raw_text,
        detection_method: infraction.detection_method,
        line_start: infraction.line_start,
        line_end: infraction.line_end,
        context_before: infraction.context_before,
        context_after: infraction.context_after,
        status: result.status,
        confidence_band: result.confidence_band,
        confidence_score: result.confidence_score,
        primary_reason: result.primary_reason,
        best_similarity: result.best_similarity,
        note: result.note,
        match_count: matches.len(),
        matches,
    }
}

/// Pair each extracted infraction with its result.
///
/// `results[i]` must belong to `extraction.infractions[i]`; the report keeps
/// document order.
#[must_use]
pub fn assemble(extraction: Extraction, results: Vec<AnalysisResult>) -> AnalysisReport {
    debug_assert_eq!(extraction.infractions.len(), results.len());
    debug_assert!(
        extraction
            .infractions
            .iter()
            .zip(&results)
            .all(|(i, r)| i.id == r.infraction_id)
    );

    let infractions: Vec<InfractionReport> = extraction
        .infractions
        .into_iter()
        .zip(results)
        .enumerate()
        .map(|(position, (infraction, result))| entry(position, infraction, result))
        .collect();

    AnalysisReport {
        summary: Summary::tally(&infractions),
        infractions,
        warnings: extraction.warnings,
    }
}

impl AnalysisReport {
    /// Stable re-sort by a caller-supplied key. Totals are unaffected.
    pub fn sort_by<K, F>(&mut self, key: F)
    where
        K: Ord,
        F: FnMut(&InfractionReport) -> K,
    {
        self.infractions.sort_by_key(key);
    }

    /// Undo any re-sort.
    pub fn restore_document_order(&mut self) {
        self.infractions.sort_by_key(|e| e.position);
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::decision::decide;
    use crate::extractor::extract_infractions;
    use crate::ranker::Match;
    use pretty_assertions::assert_eq;

    fn hit(similarity: f32) -> Match {
        Match {
            spec_chunk_id: 0,
            source_document: "std/crossarms.md".into(),
            location: ChunkLocation::Page { page: 2, offset: 40 },
            excerpt: "Oil-filled crossarms are compliant".into(),
            similarity,
        }
    }

    fn sample() -> AnalysisReport {
        let extraction = extract_infractions(
            "INFRACTION #1: Crossarm oil-filled\nINFRACTION #2: Pole tag absent\nINFRACTION #3: Riser guard\n",
        );
        let t = Thresholds::default();
        let inf = &extraction.infractions;
        let results = vec![
            decide(&inf[0], vec![hit(0.82)], &t),
            decide(&inf[1], vec![hit(0.20)], &t),
            AnalysisResult::failed(&inf[2], "input too long: 900 tokens (max 512)"),
        ];
        assemble(extraction, results)
    }

    #[test]
    fn test_summary_counts() {
        let report = sample();
        assert_eq!(
            report.summary,
            Summary {
                total: 3,
                repealable: 1,
                valid: 1,
                high_confidence: 1,
                errors: 1,
            }
        );
        assert_eq!(report.infractions[2].status, Status::Error);
        assert_eq!(report.infractions[0].match_count, 1);
    }

    #[test]
    fn test_sort_and_restore() {
        let mut report = sample();
        report.sort_by(|e| std::cmp::Reverse(e.position));
        assert_eq!(report.infractions[0].id, "INF-003");
        let before = report.summary;
        report.restore_document_order();
        let ids: Vec<&str> = report.infractions.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["INF-001", "INF-002", "INF-003"]);
        assert_eq!(report.summary, before);
    }

    #[test]
    fn test_json_shape() {
        let report = sample();
        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
        let first = &json["infractions"][0];
        assert_eq!(first["text"], "Crossarm oil-filled");
        assert_eq!(first["status"], "POTENTIALLY_REPEALABLE");
        assert_eq!(first["confidence_band"], "HIGH");
        assert_eq!(first["match_count"], 1);
        assert_eq!(first["matches"][0]["source"], "std/crossarms.md");
        assert_eq!(first["matches"][0]["location"]["page"], 2);
        assert!(first.get("note").is_none());
        assert_eq!(json["infractions"][2]["note"], "input too long: 900 tokens (max 512)");
        assert_eq!(json["summary"]["high_confidence"], 1);
        assert_eq!(json["summary"]["total"], 3);
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample();
        let back: AnalysisReport = serde_json::from_str(&report.to_json(true).unwrap()).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_empty_report() {
        let report = assemble(Extraction::default(), Vec::new());
        assert_eq!(report.summary, Summary::default());
        assert_eq!(report.summary.to_string(), "no go-backs detected");
        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();
        assert_eq!(json["infractions"], serde_json::json!([]));
        assert!(json.get("warnings").is_none());
    }
}
