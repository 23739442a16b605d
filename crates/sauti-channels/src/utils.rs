//! Shared helpers for channel implementations.

/// Split text into chunks of at most `max_chars` characters.
///
/// Breaks after the last newline inside a window when there is one, and
/// otherwise cuts at the character limit. Never splits a UTF-8 sequence.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest);
                break;
            }
        };
        let break_at = rest[..end].rfind('\n').map(|i| i + 1).unwrap_or(end);
        chunks.push(&rest[..break_at]);
        rest = &rest[break_at..];
    }

    chunks
}
