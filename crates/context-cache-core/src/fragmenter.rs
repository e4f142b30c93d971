//! Splits a text blob into an ordered sequence of overlapping, word-boundary
//! aware windows ("fragments" once persisted).
//!
//! Algorithm (spec.md §4.2, prescribed):
//! - If `input.len() <= chunk_len`, emit the input unchanged as a single chunk.
//! - Otherwise repeatedly take a window `[start, end)` where
//!   `end = start + chunk_len`; if `end` is not at the input's end, back off
//!   `end` to the most recent space at or before the original `end` (only if
//!   that position is strictly greater than `start`); trim the emitted
//!   chunk; advance `start` by `chunk_len - overlap`; terminate when the
//!   emitted window reached the input end.
//!
//! Operates on byte offsets rather than `char` offsets; callers pass ASCII
//! or UTF-8 text where chunk/overlap lengths are character-budget
//! approximations, matching how the teacher's text-processing code (e.g.
//! `comrak`-adjacent markdown handling) treats `chunk_len` as a byte budget
//! for plain-text input.

/// Split `input` into overlapping chunks of roughly `chunk_len` characters,
/// backing off to the nearest preceding space so words aren't split at a
/// chunk's trailing edge.
#[must_use]
pub fn fragment_text(input: &str, chunk_len: usize, overlap: usize) -> Vec<String> {
    if input.len() <= chunk_len {
        if input.is_empty() {
            return Vec::new();
        }
        return vec![input.to_string()];
    }

    let bytes = input.as_bytes();
    let len = bytes.len();
    let step = chunk_len.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let mut end = (start + chunk_len).min(len);

        if end < len {
            if let Some(space_pos) = rfind_space(bytes, start, end) {
                if space_pos > start {
                    end = space_pos;
                }
            }
        }

        let chunk = input[start..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= len {
            break;
        }

        start += step;
        if start >= len {
            break;
        }
    }

    chunks
}

/// Find the last space in `bytes[start..=end]`, searching backwards from
/// `end`. Operates on bytes; only ASCII space (`0x20`) counts as a boundary,
/// matching the teacher's plain-text tokenizers which treat multi-byte UTF-8
/// continuation bytes as never equal to an ASCII space byte.
fn rfind_space(bytes: &[u8], start: usize, end: usize) -> Option<usize> {
    (start..=end.min(bytes.len())).rev().find(|&i| i < bytes.len() && bytes[i] == b' ')
}
