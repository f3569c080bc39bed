/// Checklist format: a document declaring "Total Number of Non-Conforming
/// Items N" followed by rows marked failing (`Item 4: No`, `Guying | FAIL`).
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::lines::{Candidate, Lines};
use super::{DetectionMethod, ExtractionWarning};

const CONTEXT_BEFORE: usize = 3;
const CONTEXT_AFTER: usize = 7;

lazy_static! {
    static ref DECLARATION: Regex = Regex::new(
        r"(?i)total\s+(?:number\s+of\s+)?non[-\s]?conforming\s+items\s*[:#=]?\s*(\d+)"
    )
    .unwrap();

    /// A labelled row whose final cell is a failing mark.
    static ref FAILING_ROW: Regex = Regex::new(
        r"(?i)^\s*\S.*?\s*(?:[:|\t]|\s{2,})\s*(?:no|fail|failed|n/c|nc|non[-\s]?conforming|✗|☒)\s*\.?\s*$"
    )
    .unwrap();
}

/// Declared non-conforming item count, if `line` is a checklist declaration.
pub(crate) fn declared_count(line: &str) -> Option<usize> {
    DECLARATION.captures(line)?.get(1)?.as_str().parse().ok()
}

pub(crate) fn is_failing_row(line: &str) -> bool {
    FAILING_ROW.is_match(line)
}

pub(crate) fn detect(
    lines: &Lines,
    claimed: &[bool],
    warnings: &mut Vec<ExtractionWarning>,
) -> Vec<Candidate> {
    let declared = lines.iter().find_map(|(_, line)| declared_count(line));
    let Some(declared) = declared else {
        return Vec::new();
    };

    let found: Vec<Candidate> = lines
        .iter()
        .filter(|&(i, line)| !claimed[i] && declared_count(line).is_none() && is_failing_row(line))
        .map(|(i, line)| Candidate {
            method: DetectionMethod::Checklist,
            raw_text: line.trim().to_string(),
            first: i,
            last: i,
            span: i..i + 1,
            context_before: lines.before(i, CONTEXT_BEFORE),
            context_after: lines.after(i, CONTEXT_AFTER),
        })
        .collect();

    debug!("Checklist declares {declared} non-conforming item(s), found {}", found.len());
    if found.len() != declared {
        warnings.push(ExtractionWarning::ChecklistCountMismatch {
            declared,
            found: found.len(),
        });
    }
    found
}
