use crate::config::ChunkingConfig;

use super::ChunkLocation;

/// A window of source text before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct TextWindow {
    pub text: String,
    pub location: ChunkLocation,
}

/// Splits a document into overlapping windows, page by page when the text
/// carries form-feed page breaks.
pub fn split_document(text: &str, config: &ChunkingConfig) -> Vec<TextWindow> {
    let pages: Vec<&str> = text.split('\u{c}').collect();
    let paged = pages.len() > 1;

    let mut windows = Vec::new();
    for (page_idx, page) in pages.iter().enumerate() {
        for (offset, text) in split_into_windows(page, config) {
            let location = if paged {
                ChunkLocation::Page {
                    page: page_idx + 1,
                    offset,
                }
            } else {
                ChunkLocation::Offset { offset }
            };
            windows.push(TextWindow { text, location });
        }
    }
    windows
}

fn is_boundary(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';' | '\n' | '。')
}

/// Splits text into windows of about `target_chars` characters (`char`
/// count), each overlapping the previous one by `overlap_ratio` of its
/// length. Returns `(char_offset, window_text)` pairs.
///
/// Cuts prefer a sentence boundary between `min_chars` and `max_chars`; when
/// none exists the window is cut at `target_chars`. The next window starts
/// `overlap` characters before the cut, moved forward to the next word start.
pub fn split_into_windows(content: &str, config: &ChunkingConfig) -> Vec<(usize, String)> {
    let chars: Vec<char> = content.chars().collect();
    let n = chars.len();
    if content.trim().is_empty() {
        return Vec::new();
    }
    if n <= config.max_chars {
        let leading = chars.iter().take_while(|c| c.is_whitespace()).count();
        return vec![(leading, content.trim().to_string())];
    }

    let mut windows = Vec::new();
    let mut start = 0usize;

    while start < n {
        if n - start <= config.max_chars {
            push_window(&mut windows, &chars, start, n);
            break;
        }

        // Search backwards from max_chars to min_chars for a sentence boundary
        let mut cut = start + config.target_chars;
        for i in (start + config.min_chars..start + config.max_chars).rev() {
            if is_boundary(chars[i]) {
                cut = i + 1;
                break;
            }
        }

        push_window(&mut windows, &chars, start, cut);

        let overlap = ((cut - start) as f32 * config.overlap_ratio) as usize;
        let mut next = cut - overlap;
        // Skip forward to a word start so windows do not begin mid-word
        while next < cut && next > 0 && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        start = next.max(start + 1);
    }

    windows
}

fn push_window(windows: &mut Vec<(usize, String)>, chars: &[char], start: usize, end: usize) {
    let raw: String = chars[start..end].iter().collect();
    let leading = raw.chars().take_while(|c| c.is_whitespace()).count();
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        windows.push((start + leading, trimmed.to_string()));
    }
}
