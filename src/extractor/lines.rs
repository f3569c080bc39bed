use std::ops::Range;

use super::DetectionMethod;

/// Audit text split into lines, addressed by 0-based line index.
#[derive(Debug)]
pub(crate) struct Lines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Lines<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        self.lines.iter().copied().enumerate()
    }

    /// Lines in `range` (clamped to the document), without leading or
    /// trailing blank lines.
    pub fn join(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.lines.len());
        if range.start >= end {
            return String::new();
        }
        let slice = &self.lines[range.start..end];
        let blank = |l: &&str| l.trim().is_empty();
        let Some(first) = slice.iter().position(|l| !blank(l)) else {
            return String::new();
        };
        let last = slice.iter().rposition(|l| !blank(l)).unwrap_or(first);
        slice[first..=last].join("\n")
    }

    /// Up to `n` lines ending just before `line`.
    pub fn before(&self, line: usize, n: usize) -> String {
        self.join(line.saturating_sub(n)..line)
    }

    /// Up to `n` lines starting just after `line`.
    pub fn after(&self, line: usize, n: usize) -> String {
        self.join(line + 1..line + 1 + n)
    }
}

/// A detected record before ids are assigned.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub method: DetectionMethod,
    pub raw_text: String,
    /// First and last line of the record's own text, inclusive.
    pub first: usize,
    pub last: usize,
    /// Lines the record owns. Later strategies skip hits on them; context
    /// lines stay open.
    pub span: Range<usize>,
    pub context_before: String,
    pub context_after: String,
}

/// Lowercased alphanumeric tokens joined by single spaces.
pub(crate) fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_strips_blank_edges() {
        let lines = Lines::new("\n  \nalpha\n\nbeta\n\n");
        assert_eq!(lines.join(0..lines.len()), "alpha\n\nbeta");
        assert_eq!(lines.join(0..2), "");
        assert_eq!(lines.join(5..99), "");
    }

    #[test]
    fn test_before_after() {
        let lines = Lines::new("a\nb\nc\nd\ne");
        assert_eq!(lines.before(1, 3), "a");
        assert_eq!(lines.before(4, 2), "c\nd");
        assert_eq!(lines.after(2, 5), "d\ne");
        assert_eq!(lines.after(4, 5), "");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Guy-wire MISSING!! "), "guy wire missing");
        assert_eq!(normalize("---"), "");
    }
}
