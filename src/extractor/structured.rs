/// Structured markers: `INFRACTION #<n>: <body>` or `GO-BACK #<n>: <body>`.
///
/// Each marker opens one record whose body runs until the next marker or the
/// end of the document.
use lazy_static::lazy_static;
use regex::Regex;

use super::DetectionMethod;
use super::lines::{Candidate, Lines};

/// Lines of context kept ahead of a marker.
const CONTEXT_BEFORE: usize = 2;

lazy_static! {
    static ref MARKER: Regex = Regex::new(
        r"(?i)^\s*(?:infraction|go[-\s]?back)\s*(?:#|no\.?)?\s*(\d+)\s*[:.)\-]\s*(.*)$"
    )
    .unwrap();
}

/// The marker number and the text following it, if `line` opens a record.
pub(crate) fn parse_marker(line: &str) -> Option<(u32, &str)> {
    let caps = MARKER.captures(line)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    let rest = caps.get(2).map_or("", |m| m.as_str());
    Some((number, rest))
}

pub(crate) fn detect(lines: &Lines) -> Vec<Candidate> {
    let markers: Vec<(usize, &str)> = lines
        .iter()
        .filter_map(|(i, line)| parse_marker(line).map(|(_, rest)| (i, rest)))
        .collect();

    markers
        .iter()
        .enumerate()
        .map(|(n, &(start, rest))| {
            let end = markers.get(n + 1).map_or(lines.len(), |&(next, _)| next);
            let continuation = lines.join(start + 1..end);
            let raw_text = match (rest.trim(), continuation.is_empty()) {
                (head, true) => head.to_string(),
                ("", false) => continuation,
                (head, false) => format!("{head}\n{continuation}"),
            };
            let last = (start..end)
                .rev()
                .find(|&i| !lines.join(i..i + 1).is_empty())
                .unwrap_or(start);
            Candidate {
                method: DetectionMethod::Structured,
                raw_text,
                first: start,
                last,
                span: start..end,
                context_before: lines.before(start, CONTEXT_BEFORE),
                context_after: String::new(),
            }
        })
        .collect()
}
