//! Token estimation and message truncation
//!
//! Tokens are estimated at four characters each. Other components rely on
//! this ratio (reserving 1000 tokens means reserving about 4000 characters),
//! so it is fixed rather than configurable.

/// Characters per estimated token
pub const CHARS_PER_TOKEN: usize = 4;

/// Longest message admitted without truncation when it would not fit
pub const MAX_MESSAGE_CHARS: usize = 2_000;

const ELLIPSIS: &str = "...";

/// Estimated token count: `ceil(chars / 4)`
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Shorten `text` to at most `max_chars` characters
///
/// Text that fits is returned unchanged. Otherwise the cut happens at the
/// last sentence end, else the last word break, else mid-word, within
/// `max_chars - 3` characters, and `"..."` is appended.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    if max_chars <= ELLIPSIS.len() {
        return ELLIPSIS[..max_chars].to_string();
    }

    let limit = max_chars - ELLIPSIS.len();
    let prefix = char_prefix(text, limit);

    let cut = sentence_cut(prefix)
        .or_else(|| word_cut(prefix))
        .unwrap_or(prefix);

    format!("{}{}", cut, ELLIPSIS)
}

/// First `n` characters of `text`
fn char_prefix(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn sentence_cut(prefix: &str) -> Option<&str> {
    let end = prefix.rfind(is_sentence_end)?;
    let cut = prefix[..end].trim_end_matches(is_sentence_end).trim_end();
    (!cut.is_empty()).then_some(cut)
}

fn word_cut(prefix: &str) -> Option<&str> {
    let end = prefix.rfind(char::is_whitespace)?;
    let cut = prefix[..end].trim_end();
    (!cut.is_empty()).then_some(cut)
}
