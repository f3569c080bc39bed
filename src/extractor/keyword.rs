/// Keyword fallback: lines containing infraction vocabulary.
///
/// A hit inside the after-context of the previous keyword record is folded
/// into that record instead of opening a new one. A line owned by another
/// record closes the open record, so no keyword record spans it.
use lazy_static::lazy_static;
use regex::Regex;

use super::checklist::declared_count;
use super::lines::{Candidate, Lines};
use super::DetectionMethod;

const CONTEXT_BEFORE: usize = 2;
const CONTEXT_AFTER: usize = 5;

lazy_static! {
    /// go-back, violation, deficiency, non-compliant, non-conforming,
    /// correction required, does not meet, out of compliance, incomplete,
    /// failed, missing (and their common spellings).
    static ref KEYWORDS: Regex = Regex::new(
        r"(?i)\b(?:go[-\s]?backs?|violations?|deficienc(?:y|ies)|deficient|non[-\s]?complian(?:t|ce)|non[-\s]?conform(?:ing|ance|ity)|corrections?\s+required|does\s+not\s+meet|out\s+of\s+compliance|incomplete|failed|missing)\b"
    )
    .unwrap();
}

pub(crate) fn has_keyword(line: &str) -> bool {
    KEYWORDS.is_match(line)
}

fn finish(lines: &Lines, first: usize, last: usize, window_end: usize) -> Candidate {
    Candidate {
        method: DetectionMethod::Keyword,
        raw_text: lines.join(first..last + 1),
        first,
        last,
        span: first..last + 1,
        context_before: lines.before(first, CONTEXT_BEFORE),
        context_after: lines.join(last + 1..window_end),
    }
}

pub(crate) fn detect(lines: &Lines, claimed: &[bool]) -> Vec<Candidate> {
    let mut found = Vec::new();
    // (first, last, window_end) of the record still accepting hits
    let mut open: Option<(usize, usize, usize)> = None;

    for (i, line) in lines.iter() {
        if claimed[i] {
            if let Some((first, last, window_end)) = open.take() {
                found.push(finish(lines, first, last, window_end));
            }
            continue;
        }
        if declared_count(line).is_some() || !has_keyword(line) {
            continue;
        }
        match open {
            Some((first, _, window_end)) if i < window_end => {
                open = Some((first, i, window_end));
            }
            _ => {
                if let Some((first, last, window_end)) = open.take() {
                    found.push(finish(lines, first, last, window_end));
                }
                let window_end = (i + 1 + CONTEXT_AFTER).min(lines.len());
                open = Some((i, i, window_end));
            }
        }
    }
    if let Some((first, last, window_end)) = open {
        found.push(finish(lines, first, last, window_end));
    }
    found
}
