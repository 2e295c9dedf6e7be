//! Chunker — splits a payload into byte-bounded fragments.
//!
//! Fragments always end on a character boundary, so every fragment is itself
//! valid text and concatenating them in order reproduces the input exactly.

/// Split `text` into maximal fragments of at most `max_fragment_bytes` bytes.
///
/// The end cursor first advances `max_fragment_bytes` characters (no fragment
/// can hold more characters than bytes), then shrinks one character at a time
/// until the fragment fits. Empty input yields no fragments.
pub fn split(text: &str, max_fragment_bytes: usize) -> Result<Vec<&str>, ChunkError> {
    if max_fragment_bytes == 0 {
        return Err(ChunkError::ZeroBudget);
    }

    let mut fragments = Vec::with_capacity(text.len() / max_fragment_bytes + 1);
    let mut rest = text;
    let mut offset = 0;

    while !rest.is_empty() {
        // Byte index just past the first `max_fragment_bytes` characters.
        let mut end = rest
            .char_indices()
            .nth(max_fragment_bytes)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        while end > max_fragment_bytes {
            end = prev_boundary(rest, end);
        }

        if end == 0 {
            let ch = rest.chars().next().unwrap_or_default();
            return Err(ChunkError::CharacterExceedsBudget {
                offset,
                width: ch.len_utf8(),
                budget: max_fragment_bytes,
            });
        }

        let (fragment, tail) = rest.split_at(end);
        fragments.push(fragment);
        offset += end;
        rest = tail;
    }

    Ok(fragments)
}

/// Byte index of the character boundary immediately before `index`.
fn prev_boundary(s: &str, index: usize) -> usize {
    s[..index]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("fragment budget must be at least one byte")]
    ZeroBudget,

    #[error("character at byte {offset} is {width} bytes wide, budget is {budget}")]
    CharacterExceedsBudget {
        offset: usize,
        width: usize,
        budget: usize,
    },
}
