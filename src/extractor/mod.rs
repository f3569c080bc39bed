//! Infraction extraction from plain audit text.
//!
//! Three detection strategies run in order of specificity: structured
//! markers, checklist rows, then keyword fallback. Their records are unioned.
//! Each record claims the lines of its own text, and later strategies ignore
//! hits on claimed lines. Context lines are never claimed, so a hit sitting
//! next to another record still becomes its own record. Records whose
//! normalized text repeats an earlier record are dropped.

mod checklist;
mod keyword;
mod lines;
mod structured;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lines::{Candidate, Lines, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionMethod {
    Structured,
    Checklist,
    Keyword,
}

impl DetectionMethod {
    /// Strategies in the order they are applied.
    pub const ALL: [Self; 3] = [Self::Structured, Self::Checklist, Self::Keyword];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "STRUCTURED",
            Self::Checklist => "CHECKLIST",
            Self::Keyword => "KEYWORD",
        }
    }

    fn detect(
        self,
        lines: &Lines,
        claimed: &[bool],
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Vec<Candidate> {
        match self {
            Self::Structured => structured::detect(lines),
            Self::Checklist => checklist::detect(lines, claimed, warnings),
            Self::Keyword => keyword::detect(lines, claimed),
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate infraction found in an audit document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infraction {
    /// `INF-001`, `INF-002`, ... in document order.
    pub id: String,
    pub raw_text: String,
    pub detection_method: DetectionMethod,
    pub context_before: String,
    pub context_after: String,
    /// 1-based line range of `raw_text` in the audit document.
    pub line_start: usize,
    pub line_end: usize,
}

/// Non-fatal observations made while extracting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    StrategyEmpty { strategy: DetectionMethod },
    ChecklistCountMismatch { declared: usize, found: usize },
    DuplicatesDropped { count: usize },
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrategyEmpty { strategy } => write!(f, "{strategy} strategy found nothing"),
            Self::ChecklistCountMismatch { declared, found } => write!(
                f,
                "checklist declares {declared} non-conforming item(s) but {found} failing row(s) were found"
            ),
            Self::DuplicatesDropped { count } => {
                write!(f, "{count} duplicate record(s) dropped")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub infractions: Vec<Infraction>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Extract infraction records from one audit document.
///
/// Empty or whitespace-only text yields no records. Finding nothing is a
/// normal outcome.
#[must_use]
pub fn extract_infractions(text: &str) -> Extraction {
    if text.trim().is_empty() {
        return Extraction::default();
    }

    let lines = Lines::new(text);
    let mut claimed = vec![false; lines.len()];
    let mut warnings = Vec::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for method in DetectionMethod::ALL {
        let found = method.detect(&lines, &claimed, &mut warnings);
        debug!("{method} strategy found {} record(s)", found.len());
        if found.is_empty() {
            warnings.push(ExtractionWarning::StrategyEmpty { strategy: method });
        }
        for c in &found {
            for flag in &mut claimed[c.span.clone()] {
                *flag = true;
            }
        }
        candidates.extend(found);
    }

    let mut seen = HashSet::new();
    let before = candidates.len();
    // Records with no text are kept; they surface as failures downstream
    candidates.retain(|c| {
        let key = normalize(&c.raw_text);
        key.is_empty() || seen.insert(key)
    });
    let dropped = before - candidates.len();
    if dropped > 0 {
        warn!("Dropped {dropped} duplicate infraction record(s)");
        warnings.push(ExtractionWarning::DuplicatesDropped { count: dropped });
    }

    candidates.sort_by_key(|c| c.first);

    let infractions = candidates
        .into_iter()
        .enumerate()
        .map(|(n, c)| Infraction {
            id: format!("INF-{:03}", n + 1),
            raw_text: c.raw_text,
            detection_method: c.method,
            context_before: c.context_before,
            context_after: c.context_after,
            line_start: c.first + 1,
            line_end: c.last + 1,
        })
        .collect();

    Extraction {
        infractions,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn methods(e: &Extraction) -> Vec<DetectionMethod> {
        e.infractions.iter().map(|i| i.detection_method).collect()
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(extract_infractions(""), Extraction::default());
        assert_eq!(extract_infractions("  \n\t\n"), Extraction::default());
    }

    #[test]
    fn test_nothing_found_is_not_an_error() {
        let e = extract_infractions("All work completed per standard.\nCrew signed off.");
        assert!(e.infractions.is_empty());
        assert_eq!(e.warnings.len(), 3);
    }

    #[test]
    fn test_checklist_scenario() {
        let text = "Total Number of Non-Conforming Items 2\n...Item 1: No\n...Item 2: No\n...";
        let e = extract_infractions(text);
        assert_eq!(e.infractions.len(), 2);
        assert_eq!(methods(&e), vec![DetectionMethod::Checklist; 2]);
        assert_eq!(e.infractions[0].raw_text, "...Item 1: No");
        assert_eq!(e.infractions[1].id, "INF-002");
        assert_eq!(e.infractions[1].line_start, 3);
    }

    #[test]
    fn test_union_of_structured_and_keyword() {
        let text = "Site visit notes: pole tag missing at pole 3.\n\
                    \n\
                    \n\
                    \n\
                    INFRACTION #1: Crossarm is oil-filled, not GRADE B compliant\n\
                    INFRACTION #2: Guy guard missing on anchor 2\n";
        let e = extract_infractions(text);
        assert_eq!(
            methods(&e),
            vec![
                DetectionMethod::Keyword,
                DetectionMethod::Structured,
                DetectionMethod::Structured
            ]
        );
        let ids: Vec<&str> = e.infractions.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["INF-001", "INF-002", "INF-003"]);
        assert_eq!(
            e.infractions[1].raw_text,
            "Crossarm is oil-filled, not GRADE B compliant"
        );
    }

    #[test]
    fn test_keyword_directly_above_marker() {
        let text = "Pole tag missing at pole 3.\n\
                    INFRACTION #1: Crossarm is oil-filled, not GRADE B compliant";
        let e = extract_infractions(text);
        assert_eq!(
            methods(&e),
            vec![DetectionMethod::Keyword, DetectionMethod::Structured]
        );
        assert_eq!(e.infractions[0].raw_text, "Pole tag missing at pole 3.");
        assert_eq!(e.infractions[0].line_start, 1);
        assert_eq!(e.infractions[1].context_before, "Pole tag missing at pole 3.");
        assert_eq!(e.infractions[1].line_start, 2);
    }

    #[test]
    fn test_keyword_directly_below_checklist_row() {
        let text = "Total Non-Conforming Items 1\n\
                    Item 1: No\n\
                    Notes:\n\
                    Ground wire missing at pole 4, crossarm cracked";
        let e = extract_infractions(text);
        assert_eq!(
            methods(&e),
            vec![DetectionMethod::Checklist, DetectionMethod::Keyword]
        );
        assert_eq!(e.infractions[0].raw_text, "Item 1: No");
        assert_eq!(
            e.infractions[1].raw_text,
            "Ground wire missing at pole 4, crossarm cracked"
        );
        assert!(
            !e.warnings
                .iter()
                .any(|w| matches!(w, ExtractionWarning::ChecklistCountMismatch { .. }))
        );
    }

    #[test]
    fn test_keyword_inside_marker_body_not_duplicated() {
        let text = "INFRACTION #1: Ground wire missing\nINFRACTION #2: Riser guard failed";
        let e = extract_infractions(text);
        assert_eq!(methods(&e), vec![DetectionMethod::Structured; 2]);
        assert!(e.warnings.contains(&ExtractionWarning::StrategyEmpty {
            strategy: DetectionMethod::Keyword
        }));
    }

    #[test]
    fn test_checklist_rows_suppress_keywords() {
        let text = "Total Non-Conforming Items: 1\nGrounding missing  | FAIL\nNotes: none";
        let e = extract_infractions(text);
        assert_eq!(methods(&e), vec![DetectionMethod::Checklist]);
    }

    #[test]
    fn test_duplicate_text_dropped() {
        let text = "Pole tag missing.\n1\n2\n3\n4\n5\n6\n7\nPOLE TAG MISSING";
        let e = extract_infractions(text);
        assert_eq!(e.infractions.len(), 1);
        assert!(e
            .warnings
            .contains(&ExtractionWarning::DuplicatesDropped { count: 1 }));
    }

    #[test]
    fn test_deterministic() {
        let text = "INFRACTION #1: x missing\nTotal Non-Conforming Items 1\nA: No\nviolation";
        assert_eq!(extract_infractions(text), extract_infractions(text));
    }

    #[test]
    fn test_warning_serialization() {
        let json = serde_json::to_value(ExtractionWarning::StrategyEmpty {
            strategy: DetectionMethod::Checklist,
        })
        .unwrap();
        assert_eq!(json["kind"], "strategy_empty");
        assert_eq!(json["strategy"], "CHECKLIST");
    }
}
