//! Incremental sentence segmentation for streaming playback.
//!
//! A sentence ends at `. ! ? : ;` followed by whitespace; the boundary
//! character belongs to the sentence. Text after the last boundary is
//! carried to the next call, which makes the split invariant under
//! re-chunking: any fragmentation of the same total text yields the same
//! ordered sentence list.

/// Characters that end a sentence when followed by whitespace.
const BOUNDARY_CHARS: [char; 5] = ['.', '!', '?', ':', ';'];

/// Split `carry + fragment` into complete sentences and a new remainder.
///
/// Sentences are trimmed and never empty. The remainder is the text after
/// the last boundary with leading whitespace dropped (it would be trimmed
/// from the next sentence anyway).
pub fn split_sentences(carry: &str, fragment: &str) -> (Vec<String>, String) {
    let mut buffer = String::with_capacity(carry.len() + fragment.len());
    buffer.push_str(carry);
    buffer.push_str(fragment);

    let mut sentences = Vec::new();
    let mut start = 0;

    let mut chars = buffer.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !BOUNDARY_CHARS.contains(&c) {
            continue;
        }
        // A boundary needs trailing whitespace; punctuation at the very end
        // of the buffer may still be mid-token (e.g. "3." of "3.14") and
        // stays in the remainder until more text arrives.
        let Some(&(_, next)) = chars.peek() else {
            continue;
        };
        if !next.is_whitespace() {
            continue;
        }
        let end = i + c.len_utf8();
        let sentence = buffer[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_owned());
        }
        start = end;
    }

    let remainder = buffer[start..].trim_start().to_owned();
    (sentences, remainder)
}

/// Stateful wrapper carrying the remainder across fragments.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    remainder: String,
}

impl SentenceSegmenter {
    /// Create an empty segmenter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns the sentences it completed.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        let (sentences, remainder) = split_sentences(&self.remainder, fragment);
        self.remainder = remainder;
        sentences
    }

    /// Flush the carried remainder as a final sentence, if any.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.remainder);
        let tail = tail.trim();
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_owned())
        }
    }
}
