//! Paragraph-boundary passage splitter.
//!
//! Long writing samples are split into passages before they are stored, so
//! each retrieved fragment is short enough to fit in a generation prompt.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries.
//! 2. Accumulate paragraphs into a buffer until adding the next one
//!    would exceed `max_chars`.
//! 3. Flush the buffer as a passage and start a new one.
//! 4. A single paragraph longer than `max_chars` is hard-split at the
//!    nearest newline or space before the limit.
//!
//! Blank input yields no passages.
//!
//! ```rust
//! use voice_retrieval_core::chunk::split_passages;
//!
//! let passages = split_passages("Hello world.\n\nSecond paragraph.", 1000);
//! assert_eq!(passages, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

/// Default passage size in bytes.
pub const DEFAULT_MAX_CHARS: usize = 1200;

/// Split `text` into passages of at most `max_chars` bytes (a lone word
/// longer than the limit is kept whole up to the limit boundary).
pub fn split_passages(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut passages = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if buf.is_empty() {
            trimmed.len()
        } else {
            buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !buf.is_empty() {
            passages.push(std::mem::take(&mut buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut passages);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(trimmed);
        }
    }

    if !buf.is_empty() {
        passages.push(buf);
    }
    passages
}

fn hard_split(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let limit = snap_to_char_boundary(remaining, remaining.len().min(max_chars));
        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        // Guarantee progress on a leading multibyte char wider than the limit.
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len())
        } else {
            split_at
        };

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_passage() {
        assert_eq!(split_passages("Hello, world!", 100), vec!["Hello, world!"]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(split_passages("", 100).is_empty());
        assert!(split_passages("\n\n  \n\n", 100).is_empty());
    }

    #[test]
    fn test_paragraphs_exceeding_limit_are_flushed() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let passages = split_passages(text, 30);
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[1], "This is paragraph two.");
    }

    #[test]
    fn test_long_paragraph_hard_split_on_space() {
        let text = "one two three four five six seven eight";
        let passages = split_passages(text, 10);
        assert!(passages.len() > 1);
        for p in &passages {
            assert!(p.len() <= 10, "{p:?} too long");
        }
        assert_eq!(passages.join(" "), text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let passages = split_passages(text, 3);
        assert!(!passages.is_empty());
        assert!(passages.iter().all(|p| !p.is_empty()));
    }
}
