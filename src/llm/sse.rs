//! Incremental parser for `data:`-framed stream records.
//!
//! Model providers frame streamed replies as newline-delimited records:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//! data: [DONE]
//! ```
//!
//! Network chunks split lines at arbitrary byte positions, so the parser
//! buffers a partial line across `push` calls. Comment lines and non-`data`
//! fields are ignored.

/// The literal payload that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental record parser. Feed raw chunks, collect `data:` payloads.
#[derive(Debug, Default)]
pub struct RecordParser {
    line_buffer: String,
}

impl RecordParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes; returns the payloads of any `data:` lines
    /// completed by this chunk, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(chunk);
        let mut payloads = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(payload) = data_payload(line) {
                    payloads.push(payload.to_owned());
                }
            } else {
                self.line_buffer.push(ch);
            }
        }

        payloads
    }

    /// Flush a trailing `data:` line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.line_buffer);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        data_payload(line).map(str::to_owned)
    }
}

/// Extract the payload of a `data:` line, or `None` for anything else
/// (empty lines, comments, other SSE fields).
fn data_payload(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?;
    // A single leading space after the colon is framing, not payload.
    Some(payload.strip_prefix(' ').unwrap_or(payload))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn single_record() {
        let mut p = RecordParser::new();
        let out = p.push(b"data: hello\n");
        assert_eq!(out, vec!["hello"]);
    }

    #[test]
    fn record_split_across_chunks() {
        let mut p = RecordParser::new();
        assert!(p.push(b"data: hel").is_empty());
        assert_eq!(p.push(b"lo\n"), vec!["hello"]);
    }

    #[test]
    fn multiple_records_one_chunk() {
        let mut p = RecordParser::new();
        let out = p.push(b"data: a\n\ndata: b\n");
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn crlf_lines() {
        let mut p = RecordParser::new();
        assert_eq!(p.push(b"data: hi\r\n"), vec!["hi"]);
    }

    #[test]
    fn no_space_after_colon() {
        let mut p = RecordParser::new();
        assert_eq!(p.push(b"data:hi\n"), vec!["hi"]);
    }

    #[test]
    fn comments_and_other_fields_ignored() {
        let mut p = RecordParser::new();
        let out = p.push(b": keepalive\nevent: delta\ndata: x\n");
        assert_eq!(out, vec!["x"]);
    }

    #[test]
    fn done_sentinel_is_a_plain_payload() {
        let mut p = RecordParser::new();
        let out = p.push(b"data: [DONE]\n");
        assert_eq!(out, vec![DONE_SENTINEL]);
    }

    #[test]
    fn finish_flushes_trailing_line() {
        let mut p = RecordParser::new();
        assert!(p.push(b"data: tail").is_empty());
        assert_eq!(p.finish().as_deref(), Some("tail"));
        assert!(p.finish().is_none());
    }

    #[test]
    fn json_payload_with_colons() {
        let mut p = RecordParser::new();
        let out = p.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n");
        assert_eq!(out, vec!["{\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}"]);
    }
}
