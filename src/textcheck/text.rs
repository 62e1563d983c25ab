//! UTF-16 position helpers
//!
//! The editor and the check endpoint both address text in UTF-16 code units,
//! Rust strings in bytes. Everything crossing the boundary goes through here.

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

pub fn utf16_units(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// UTF-16 offset of a byte offset (must be a char boundary)
pub fn utf16_offset(text: &str, byte: usize) -> usize {
    text[..byte].encode_utf16().count()
}

/// Whether `units[start..end]` spells exactly `word`
pub fn span_equals(units: &[u16], start: usize, end: usize, word: &str) -> bool {
    if start > end || end > units.len() {
        return false;
    }
    units[start..end].iter().copied().eq(word.encode_utf16())
}

/// Whether the character ending at `pos` or starting at `pos` is part of a word
fn is_word_unit(units: &[u16], pos: usize, before: bool) -> bool {
    let decoded = if before {
        // Walk back over a possible surrogate pair
        let start = pos.saturating_sub(2);
        char::decode_utf16(units[start..pos].iter().copied())
            .filter_map(Result::ok)
            .last()
    } else {
        char::decode_utf16(units[pos..].iter().copied())
            .next()
            .and_then(Result::ok)
    };
    decoded.is_some_and(|c| c.is_alphanumeric())
}

/// Whether `units[start..end]` is delimited by non-word characters on both sides
pub fn is_whole_word(units: &[u16], start: usize, end: usize) -> bool {
    if start > end || end > units.len() {
        return false;
    }
    let left_ok = start == 0 || !is_word_unit(units, start, true);
    let right_ok = end == units.len() || !is_word_unit(units, end, false);
    left_ok && right_ok
}

/// UTF-16 start offsets of every whole-word occurrence of `word`, in order
pub fn whole_word_offsets(text: &str, word: &str) -> Vec<usize> {
    if word.is_empty() {
        return Vec::new();
    }

    let bounds: HashSet<usize> = text
        .split_word_bound_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    text.match_indices(word)
        .map(|(byte, _)| byte)
        .filter(|byte| bounds.contains(byte) && bounds.contains(&(byte + word.len())))
        .map(|byte| utf16_offset(text, byte))
        .collect()
}

/// Find the first whole-word occurrence of `word` starting at or after the
/// UTF-16 offset `from`. Returns the UTF-16 start offset.
pub fn find_whole_word(text: &str, word: &str, from: usize) -> Option<usize> {
    whole_word_offsets(text, word).into_iter().find(|&start| start >= from)
}
