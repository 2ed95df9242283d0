//! Budget truncation that prefers sentence boundaries.
//!
//! The cut point is estimated proportionally from the current token count,
//! then pulled back to the last `.`, `!` or `?` when that keeps at least
//! 80% of the proportional cut. Consumers tolerate a slightly short prompt
//! but not a sentence broken mid-way.

use crate::context::token::estimate_tokens;

/// A boundary earlier than this fraction of the cutoff is ignored.
const MIN_SENTENCE_KEEP: f64 = 0.8;

const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];

/// Shrink `text` so that its estimate is at most `max_tokens`.
///
/// Text already within budget is returned unchanged. The result is always a
/// prefix of the input.
pub fn truncate_to_tokens(text: &str, max_tokens: usize, model: &str) -> String {
    let current = estimate_tokens(text, model);
    if current <= max_tokens {
        return text.to_string();
    }
    if max_tokens == 0 {
        return String::new();
    }

    let char_count = text.chars().count();
    let cutoff = (char_count as f64 * (max_tokens as f64 / current as f64)).floor() as usize;

    let cut_byte = byte_offset(text, cutoff);
    let head = &text[..cut_byte];

    // Last sentence ending inside the slice, as a character position.
    let boundary = head
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| SENTENCE_ENDINGS.contains(c))
        .last()
        .map(|(char_pos, (byte_pos, c))| (char_pos, byte_pos + c.len_utf8()));

    match boundary {
        Some((char_pos, end_byte)) if char_pos as f64 >= cutoff as f64 * MIN_SENTENCE_KEEP => {
            head[..end_byte].to_string()
        }
        _ => head.to_string(),
    }
}

/// Byte offset of the `n`th character (or the end of the string).
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
