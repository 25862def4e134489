//! Streaming filter for `<think>...</think>` reasoning spans.
//!
//! Reasoning-capable models interleave out-of-band reasoning with the
//! spoken reply. Span contents must never reach the segmenter, no matter
//! how the stream is chunked — including a marker split across fragments.

/// Incrementally strips reasoning spans from streamed text.
#[derive(Debug, Default)]
pub struct ThinkBlockFilter {
    in_span: bool,
    carry: String,
}

impl ThinkBlockFilter {
    const OPEN: &'static str = "<think>";
    const CLOSE: &'static str = "</think>";

    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment and return the newly safe text (outside any span).
    ///
    /// Text that could still turn out to be the start of a marker is
    /// withheld until the next fragment disambiguates it.
    pub fn push(&mut self, fragment: &str) -> String {
        if fragment.is_empty() {
            return String::new();
        }
        self.carry.push_str(fragment);

        let mut safe = String::new();
        loop {
            if self.in_span {
                if let Some(end) = self.carry.find(Self::CLOSE) {
                    self.carry.drain(..end + Self::CLOSE.len());
                    self.in_span = false;
                    continue;
                }
                // Span body is discarded; keep only the minimal suffix
                // needed to detect a close marker split across fragments.
                let keep = Self::CLOSE.len() - 1;
                if self.carry.len() > keep {
                    let mut drain = self.carry.len() - keep;
                    while !self.carry.is_char_boundary(drain) {
                        drain -= 1;
                    }
                    self.carry.drain(..drain);
                }
                break;
            }

            if let Some(start) = self.carry.find(Self::OPEN) {
                safe.push_str(&self.carry[..start]);
                self.carry.drain(..start + Self::OPEN.len());
                self.in_span = true;
                continue;
            }

            // Emit everything except a tail that is still a viable marker
            // prefix ("<thi" must wait; "hello" must not).
            let hold = marker_prefix_len(&self.carry);
            let emit = self.carry.len() - hold;
            safe.push_str(&self.carry[..emit]);
            self.carry.drain(..emit);
            break;
        }

        safe
    }

    /// Flush the remaining tail at end of stream.
    ///
    /// An unterminated span is discarded — it never closed, so it is never
    /// spoken. A withheld marker prefix turned out to be plain text.
    pub fn finish(&mut self) -> String {
        if self.in_span {
            self.carry.clear();
            self.in_span = false;
            return String::new();
        }
        std::mem::take(&mut self.carry)
    }
}

/// Length of the longest buffer suffix that is a proper prefix of either
/// marker, i.e. text that the next fragment could still complete into one.
fn marker_prefix_len(buffer: &str) -> usize {
    let longest = ThinkBlockFilter::CLOSE.len() - 1;
    let max = buffer.len().min(longest);
    for hold in (1..=max).rev() {
        let at = buffer.len() - hold;
        if !buffer.is_char_boundary(at) {
            continue;
        }
        let tail = &buffer[at..];
        if ThinkBlockFilter::OPEN.starts_with(tail) || ThinkBlockFilter::CLOSE.starts_with(tail) {
            return hold;
        }
    }
    0
}
